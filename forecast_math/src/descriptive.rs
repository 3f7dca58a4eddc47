//! Descriptive statistics over plain `f64` slices.
//!
//! All functions are total: degenerate input (empty slices, zero variance)
//! yields `0.0` or `None` instead of NaN.

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (denominator `n - 1`), `0.0` below two observations.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Minimum and maximum, `None` for an empty slice.
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Median of the values, `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Pearson correlation between the series and itself shifted by `lag`.
///
/// Returns `None` when the lag leaves fewer than two overlapping pairs or when
/// either side has zero variance.
pub fn autocorrelation(values: &[f64], lag: usize) -> Option<f64> {
    if lag == 0 || values.len() < lag + 2 {
        return None;
    }
    let leading = &values[..values.len() - lag];
    let lagged = &values[lag..];

    let mean_a = mean(leading);
    let mean_b = mean(lagged);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (a, b) in leading.iter().zip(lagged) {
        let da = a - mean_a;
        let db = b - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 {
        return None;
    }
    Some(cov / denom)
}

/// Ordinary least squares line through `(index, value)` pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Fit a straight line against the observation index.
///
/// Needs at least two points. `r_squared` is `0.0` for a constant series.
pub fn linear_trend(values: &[f64]) -> Option<LinearTrend> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;

    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(values);

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean) * (x - x_mean);
    }

    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;

    let mut ss_total = 0.0;
    let mut ss_residual = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        ss_total += (y - y_mean).powi(2);
        ss_residual += (y - predicted).powi(2);
    }

    let r_squared = if ss_total < 1e-12 {
        0.0
    } else {
        1.0 - ss_residual / ss_total
    };

    Some(LinearTrend {
        slope,
        intercept,
        r_squared,
    })
}

/// First difference applied `order` times.
pub fn difference(values: &[f64], order: usize) -> Vec<f64> {
    let mut current = values.to_vec();
    for _ in 0..order {
        if current.len() < 2 {
            return Vec::new();
        }
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        assert_relative_eq!(variance(&values), 32.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(mean(&[]), 0.0);
        assert_relative_eq!(variance(&[1.0]), 0.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_autocorrelation_detects_period() {
        let values: Vec<f64> = (0..70)
            .map(|i| (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin())
            .collect();
        let lag7 = autocorrelation(&values, 7).unwrap();
        assert!(lag7 > 0.99);
        let lag3 = autocorrelation(&values, 3).unwrap();
        assert!(lag3 < 0.0);
    }

    #[test]
    fn test_autocorrelation_degenerate() {
        assert_eq!(autocorrelation(&[1.0, 1.0, 1.0, 1.0], 1), None);
        assert_eq!(autocorrelation(&[1.0, 2.0, 3.0], 7), None);
    }

    #[test]
    fn test_linear_trend() {
        let fit = linear_trend(&[10.0, 20.0, 30.0]).unwrap();
        assert_relative_eq!(fit.slope, 10.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 10.0, epsilon = 1e-12);
        assert!(fit.r_squared > 0.999);

        let flat = linear_trend(&[5.0, 5.0, 5.0]).unwrap();
        assert_relative_eq!(flat.slope, 0.0);
        assert_relative_eq!(flat.r_squared, 0.0);
    }

    #[test]
    fn test_difference() {
        let values = [1.0, 4.0, 9.0, 16.0];
        assert_eq!(difference(&values, 1), vec![3.0, 5.0, 7.0]);
        assert_eq!(difference(&values, 2), vec![2.0, 2.0]);
        assert!(difference(&[1.0], 1).is_empty());
    }
}
