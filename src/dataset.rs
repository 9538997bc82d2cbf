//! Synthetic waiting-time data and the seeded train/test partition.
//!
//! All randomness comes from the caller's generator, so a given seed always
//! reproduces the same samples and the same split.

use rand::{seq::SliceRandom, Rng};
use rand_distr::{Distribution, StandardNormal};

use crate::types::{FeatureVector, TrainingSample, MIN_WAIT_MINUTES};

pub type Dataset = Vec<TrainingSample>;

const BASE_WAIT_MINUTES: f64 = 10.0;
const NOISE_STD_MINUTES: f64 = 3.0;
const CROWDED_ABOVE: i64 = 20;

/// Hours 7-9 and 16-19.
pub fn is_peak_hour(hour_of_day: i64) -> bool {
    (7..=9).contains(&hour_of_day) || (16..=19).contains(&hour_of_day)
}

/// Sunday (0) or Saturday (6).
pub fn is_weekend(day_of_week: i64) -> bool {
    day_of_week == 0 || day_of_week == 6
}

pub fn generate_synthetic_dataset<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Dataset {
    (0..n).map(|_| synth_sample(rng)).collect()
}

fn synth_sample<R: Rng + ?Sized>(rng: &mut R) -> TrainingSample {
    let features = FeatureVector {
        stop_id: rng.gen_range(1..20),
        day_of_week: rng.gen_range(0..7),
        hour_of_day: rng.gen_range(5..23),
        passenger_count: rng.gen_range(1..30),
    };

    let mut wait = BASE_WAIT_MINUTES;
    if is_peak_hour(features.hour_of_day) {
        wait += rng.gen_range(5..15) as f64;
    }
    if is_weekend(features.day_of_week) {
        wait -= rng.gen_range(0..5) as f64;
    }
    let z: f64 = StandardNormal.sample(rng);
    wait += z * NOISE_STD_MINUTES;
    if features.passenger_count > CROWDED_ABOVE {
        wait += rng.gen_range(2..5) as f64;
    }

    TrainingSample {
        features,
        waiting_time_minutes: wait.max(MIN_WAIT_MINUTES),
    }
}

/// Shuffled partition into `(train, test)`. The test side gets `ceil(n * test_fraction)`
/// rows, kept within `[1, n - 1]` whenever `n >= 2` so neither side is empty.
pub fn split<R: Rng + ?Sized>(
    dataset: &[TrainingSample],
    test_fraction: f64,
    rng: &mut R,
) -> (Dataset, Dataset) {
    let n = dataset.len();
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(rng);

    let mut n_test = (n as f64 * test_fraction).ceil() as usize;
    if n >= 2 {
        n_test = n_test.clamp(1, n - 1);
    } else {
        n_test = n_test.min(n);
    }

    let test = idx[..n_test].iter().map(|&i| dataset[i]).collect();
    let train = idx[n_test..].iter().map(|&i| dataset[i]).collect();
    (train, test)
}
