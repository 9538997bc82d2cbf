use serde::{Deserialize, Serialize};

pub const DEFAULT_STOP_ID: i64 = 1;
pub const DEFAULT_DAY_OF_WEEK: i64 = 1;
pub const DEFAULT_HOUR_OF_DAY: i64 = 12;
pub const DEFAULT_PASSENGER_COUNT: i64 = 10;

/// Floor applied to every waiting time: labels, model output and served predictions.
pub const MIN_WAIT_MINUTES: f64 = 2.0;

/// Column order the model is trained on and queried with.
pub const FEATURE_NAMES: [&str; 4] = ["stop_id", "day_of_week", "hour_of_day", "passenger_count"];
pub const N_FEATURES: usize = FEATURE_NAMES.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub stop_id: i64,         // >= 1
    pub day_of_week: i64,     // 0=Sunday .. 6=Saturday
    pub hour_of_day: i64,     // 0..=23
    pub passenger_count: i64, // >= 0
}

impl FeatureVector {
    /// Row layout matching `FEATURE_NAMES`.
    pub fn to_row(&self) -> [f64; N_FEATURES] {
        [
            self.stop_id as f64,
            self.day_of_week as f64,
            self.hour_of_day as f64,
            self.passenger_count as f64,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    #[serde(flatten)]
    pub features: FeatureVector,
    pub waiting_time_minutes: f64,
}

// ---------- Wire types ----------

// Every field is optional; absent (or null) fields take the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
    pub stop_id: Option<i64>,
    pub day_of_week: Option<i64>,
    pub hour_of_day: Option<i64>,
    pub passenger_count: Option<i64>,
}

impl PredictRequest {
    pub fn to_features(&self) -> FeatureVector {
        FeatureVector {
            stop_id: self.stop_id.unwrap_or(DEFAULT_STOP_ID),
            day_of_week: self.day_of_week.unwrap_or(DEFAULT_DAY_OF_WEEK),
            hour_of_day: self.hour_of_day.unwrap_or(DEFAULT_HOUR_OF_DAY),
            passenger_count: self.passenger_count.unwrap_or(DEFAULT_PASSENGER_COUNT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_wait_minutes: i64,
    pub stop_id: i64,
    pub day_of_week: i64,
    pub hour_of_day: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchPredictRequest {
    #[serde(default)]
    pub predictions: Vec<PredictRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub stop_id: i64,
    pub predicted_wait_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictResponse {
    pub predictions: Vec<BatchItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub model_loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_uses_defaults() {
        let req: PredictRequest = serde_json::from_str("{}").unwrap();
        let fv = req.to_features();
        assert_eq!(
            fv,
            FeatureVector { stop_id: 1, day_of_week: 1, hour_of_day: 12, passenger_count: 10 }
        );
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let req: PredictRequest =
            serde_json::from_str(r#"{"stop_id": 7, "hour_of_day": null}"#).unwrap();
        let fv = req.to_features();
        assert_eq!(fv.stop_id, 7);
        assert_eq!(fv.hour_of_day, DEFAULT_HOUR_OF_DAY);
    }

    #[test]
    fn non_integer_field_is_rejected() {
        assert!(serde_json::from_str::<PredictRequest>(r#"{"stop_id": "one"}"#).is_err());
    }

    #[test]
    fn batch_without_key_is_empty() {
        let req: BatchPredictRequest = serde_json::from_str("{}").unwrap();
        assert!(req.predictions.is_empty());
    }

    #[test]
    fn row_follows_feature_order() {
        let fv = FeatureVector { stop_id: 3, day_of_week: 6, hour_of_day: 8, passenger_count: 25 };
        assert_eq!(fv.to_row(), [3.0, 6.0, 8.0, 25.0]);
    }
}
