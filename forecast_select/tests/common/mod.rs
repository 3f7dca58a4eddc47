//! Synthetic series shared by the integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use forecast_select::TimeSeries;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

pub fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn daily(values: &[f64]) -> TimeSeries {
    TimeSeries::daily(start(), values).unwrap()
}

pub fn linear_trend(n: usize) -> TimeSeries {
    let values: Vec<f64> = (0..n).map(|i| 20.0 + 1.5 * i as f64).collect();
    daily(&values)
}

/// Daily load with a weekly cycle, slow growth and Gaussian noise.
pub fn weekly_load(n: usize, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Normal<f64> = Normal::new(0.0, 2.0).unwrap();
    let values: Vec<f64> = (0..n)
        .map(|i| {
            let weekly = 15.0 * (2.0 * PI * i as f64 / 7.0).sin();
            200.0 + 0.5 * i as f64 + weekly + noise.sample(&mut rng)
        })
        .collect();
    daily(&values)
}

/// Daily success rate hovering near 0.9.
pub fn success_rate(n: usize, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Normal<f64> = Normal::new(0.0, 0.03).unwrap();
    let values: Vec<f64> = (0..n)
        .map(|_| (0.9 + noise.sample(&mut rng)).clamp(0.0, 1.0))
        .collect();
    daily(&values)
}
