//! Decomposable trend-plus-seasonality model in the style of Prophet.
//!
//! The series is modelled as `g(t) + s(t)` (or `g(t)·(1 + s(t))` in
//! multiplicative mode) where `g` is a piecewise-linear trend with
//! changepoints spread over the early part of the history and `s` is a sum of
//! Fourier blocks. Parameters are the MAP estimate under Gaussian priors,
//! which reduces to ridge-penalised least squares: the changepoint and
//! seasonality prior scales become per-column penalties.
//!
//! Logistic growth is handled by fitting in logit space between the floor and
//! cap, so every prediction and interval bound stays inside those limits.

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Utc};
use forecast_math::regression::ridge_least_squares;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MetricType;
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ensure_min_points, z_score, ForecastModel, ForecastResult, MIN_FIT_POINTS};
use crate::utils::{future_timestamps, infer_step};

const MODEL_NAME: &str = "prophet";

/// Noise variance, in scaled units, assumed when turning prior scales into
/// ridge penalties.
const ASSUMED_NOISE_VARIANCE: f64 = 0.01;

/// Share of the floor-to-cap range kept clear of the bounds before the logit.
const LOGISTIC_MARGIN: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Growth {
    Linear,
    /// Bounded growth between `floor` and `cap`
    Logistic { floor: f64, cap: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    Additive,
    Multiplicative,
}

/// Whether a built-in seasonality is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityToggle {
    /// Included when the history is long and dense enough
    Auto,
    On,
    Off,
}

/// A Fourier seasonal block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
}

impl Seasonality {
    pub fn new(name: impl Into<String>, period_days: f64, fourier_order: usize) -> Self {
        Self {
            name: name.into(),
            period_days,
            fourier_order,
        }
    }

    pub fn yearly() -> Self {
        Self::new("yearly", 365.25, 10)
    }

    pub fn weekly() -> Self {
        Self::new("weekly", 7.0, 3)
    }

    pub fn daily() -> Self {
        Self::new("daily", 1.0, 4)
    }

    pub fn monthly() -> Self {
        Self::new("monthly", 30.5, 5)
    }

    pub fn quarterly() -> Self {
        Self::new("quarterly", 91.25, 3)
    }

    fn features(&self, days: f64, row: &mut Vec<f64>) {
        for k in 1..=self.fourier_order {
            let angle = 2.0 * PI * k as f64 * days / self.period_days;
            row.push(angle.sin());
            row.push(angle.cos());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProphetConfig {
    pub growth: Growth,
    pub seasonality_mode: SeasonalityMode,
    pub yearly_seasonality: SeasonalityToggle,
    pub weekly_seasonality: SeasonalityToggle,
    pub daily_seasonality: SeasonalityToggle,
    /// Seasonal blocks added on top of the built-in ones
    pub extra_seasonalities: Vec<Seasonality>,
    pub n_changepoints: usize,
    /// Share of the history in which changepoints are placed
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub interval_width: f64,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self::for_metric(MetricType::General)
    }
}

impl ProphetConfig {
    /// Preset for a metric category.
    pub fn for_metric(metric_type: MetricType) -> Self {
        let base = Self {
            growth: Growth::Linear,
            seasonality_mode: SeasonalityMode::Additive,
            yearly_seasonality: SeasonalityToggle::Auto,
            weekly_seasonality: SeasonalityToggle::Auto,
            daily_seasonality: SeasonalityToggle::Off,
            extra_seasonalities: vec![Seasonality::monthly(), Seasonality::quarterly()],
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            interval_width: 0.95,
        };

        match metric_type {
            MetricType::Probability => Self {
                growth: Growth::Logistic {
                    floor: 0.0,
                    cap: 1.0,
                },
                weekly_seasonality: SeasonalityToggle::On,
                extra_seasonalities: vec![Seasonality::monthly()],
                changepoint_prior_scale: 0.01,
                seasonality_prior_scale: 1.0,
                ..base
            },
            MetricType::Load => Self {
                seasonality_mode: SeasonalityMode::Multiplicative,
                yearly_seasonality: SeasonalityToggle::On,
                weekly_seasonality: SeasonalityToggle::On,
                daily_seasonality: SeasonalityToggle::On,
                ..base
            },
            MetricType::General => base,
        }
    }

    pub fn with_interval_width(mut self, interval_width: f64) -> Self {
        self.interval_width = interval_width;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Growth::Logistic { floor, cap } = self.growth {
            if !(cap > floor) {
                return Err(ForecastError::InvalidParameter(format!(
                    "Logistic cap ({cap}) must exceed floor ({floor})"
                )));
            }
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "changepoint_range must be in (0, 1]".to_string(),
            ));
        }
        if !(self.changepoint_prior_scale > 0.0 && self.seasonality_prior_scale > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Prior scales must be positive".to_string(),
            ));
        }
        if self
            .extra_seasonalities
            .iter()
            .any(|s| !(s.period_days > 0.0) || s.fourier_order == 0)
        {
            return Err(ForecastError::InvalidParameter(
                "Seasonalities need a positive period and order".to_string(),
            ));
        }
        Ok(())
    }

    /// Seasonal blocks to fit for a history of `span_days` sampled every
    /// `step_days`.
    ///
    /// A block is skipped when its period is under two sampling steps or
    /// longer than the history.
    fn active_seasonalities(&self, span_days: f64, step_days: f64) -> Vec<Seasonality> {
        let built_in = [
            (self.yearly_seasonality, Seasonality::yearly(), span_days >= 730.0),
            (
                self.weekly_seasonality,
                Seasonality::weekly(),
                span_days >= 14.0 && step_days < 7.0,
            ),
            (
                self.daily_seasonality,
                Seasonality::daily(),
                span_days >= 2.0 && step_days < 1.0,
            ),
        ];

        built_in
            .into_iter()
            .filter_map(|(toggle, seasonality, auto)| match toggle {
                SeasonalityToggle::On => Some(seasonality),
                SeasonalityToggle::Auto if auto => Some(seasonality),
                _ => None,
            })
            .chain(self.extra_seasonalities.iter().cloned())
            .filter(|s| {
                let keep = s.period_days >= 2.0 * step_days && s.period_days <= span_days;
                if !keep {
                    debug!(
                        seasonality = %s.name,
                        period_days = s.period_days,
                        "Skipping seasonality unsupported by the sampling"
                    );
                }
                keep
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct FittedProphet {
    start: DateTime<Utc>,
    span_days: f64,
    last_timestamp: DateTime<Utc>,
    step: Duration,
    n_obs: usize,
    y_scale: f64,
    changepoints: Vec<f64>,
    seasonalities: Vec<Seasonality>,
    trend_coefficients: Vec<f64>,
    seasonal_coefficients: Vec<f64>,
    multiplicative: bool,
    /// Residual standard deviation in scaled units
    sigma: f64,
}

impl FittedProphet {
    fn components(&self, days: f64) -> (f64, f64) {
        let t = days / self.span_days;
        let trend = dot(&trend_row(t, &self.changepoints), &self.trend_coefficients);
        let seasonal = dot(
            &seasonal_row(days, &self.seasonalities),
            &self.seasonal_coefficients,
        );
        (trend, seasonal)
    }

    fn combine(&self, trend: f64, seasonal: f64) -> f64 {
        if self.multiplicative {
            trend * (1.0 + seasonal)
        } else {
            trend + seasonal
        }
    }
}

/// Prophet-style forecaster.
#[derive(Debug, Clone)]
pub struct ProphetModel {
    config: ProphetConfig,
    fitted: Option<FittedProphet>,
}

impl ProphetModel {
    pub fn new(config: ProphetConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn for_metric(metric_type: MetricType) -> Self {
        Self::new(ProphetConfig::for_metric(metric_type))
    }

    pub fn config(&self) -> &ProphetConfig {
        &self.config
    }

    /// Names of the seasonal blocks used by the last fit.
    pub fn seasonality_names(&self) -> Vec<&str> {
        self.fitted
            .iter()
            .flat_map(|f| f.seasonalities.iter().map(|s| s.name.as_str()))
            .collect()
    }

    /// Number of changepoints used by the last fit.
    pub fn changepoint_count(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.changepoints.len())
    }

    /// Whether the last fit used multiplicative seasonality.
    pub fn is_multiplicative(&self) -> bool {
        self.fitted.as_ref().is_some_and(|f| f.multiplicative)
    }

    fn to_model_space(&self, value: f64) -> f64 {
        match self.config.growth {
            Growth::Linear => value,
            Growth::Logistic { floor, cap } => {
                let margin = LOGISTIC_MARGIN * (cap - floor);
                let clipped = value.clamp(floor + margin, cap - margin);
                ((clipped - floor) / (cap - clipped)).ln()
            }
        }
    }

    fn from_model_space(&self, value: f64) -> f64 {
        match self.config.growth {
            Growth::Linear => value,
            Growth::Logistic { floor, cap } => floor + (cap - floor) / (1.0 + (-value).exp()),
        }
    }
}

impl ForecastModel for ProphetModel {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn fit(&mut self, training: &TimeSeries) -> Result<()> {
        ensure_min_points(training, MIN_FIT_POINTS)?;
        self.config.validate()?;

        let timestamps = training.timestamps();
        let (start, last_timestamp) = match (timestamps.first(), timestamps.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(ForecastError::InsufficientData {
                    required: MIN_FIT_POINTS,
                    actual: 0,
                })
            }
        };
        let days: Vec<f64> = timestamps.iter().map(|&ts| days_since(start, ts)).collect();
        let span_days = days_since(start, last_timestamp);
        if span_days <= 0.0 {
            return Err(ForecastError::fit(MODEL_NAME, "history spans no time"));
        }
        let t: Vec<f64> = days.iter().map(|d| d / span_days).collect();

        let transformed: Vec<f64> = training
            .values()
            .into_iter()
            .map(|v| self.to_model_space(v))
            .collect();
        let max_abs = transformed.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let y_scale = if max_abs > 1e-12 { max_abs } else { 1.0 };
        let y: Vec<f64> = transformed.iter().map(|v| v / y_scale).collect();

        let step = infer_step(&timestamps);
        let step_days = step.num_seconds() as f64 / 86_400.0;
        let seasonalities = self.config.active_seasonalities(span_days, step_days);
        let changepoints = place_changepoints(
            &t,
            self.config.n_changepoints,
            self.config.changepoint_range,
        );

        let trend_rows: Vec<Vec<f64>> = t.iter().map(|&ti| trend_row(ti, &changepoints)).collect();
        let seasonal_rows: Vec<Vec<f64>> = days
            .iter()
            .map(|&d| seasonal_row(d, &seasonalities))
            .collect();

        let changepoint_penalty =
            ASSUMED_NOISE_VARIANCE / self.config.changepoint_prior_scale.powi(2);
        let seasonal_penalty = ASSUMED_NOISE_VARIANCE / self.config.seasonality_prior_scale.powi(2);
        let trend_penalties: Vec<f64> = [0.0, 0.0]
            .into_iter()
            .chain(std::iter::repeat(changepoint_penalty).take(changepoints.len()))
            .collect();
        let seasonal_width = seasonal_rows.first().map_or(0, Vec::len);
        let seasonal_penalties = vec![seasonal_penalty; seasonal_width];

        let wants_multiplicative = self.config.seasonality_mode == SeasonalityMode::Multiplicative;
        let multiplicative_fit = if wants_multiplicative
            && self.config.growth == Growth::Linear
            && seasonal_width > 0
        {
            fit_multiplicative(
                &trend_rows,
                &seasonal_rows,
                &y,
                &trend_penalties,
                &seasonal_penalties,
            )?
        } else {
            None
        };
        if wants_multiplicative && multiplicative_fit.is_none() {
            debug!("Multiplicative seasonality not applicable, fitting additively");
        }

        let multiplicative = multiplicative_fit.is_some();
        let (trend_coefficients, seasonal_coefficients) = match multiplicative_fit {
            Some(coefficients) => coefficients,
            None => {
                let rows: Vec<Vec<f64>> = trend_rows
                    .iter()
                    .zip(&seasonal_rows)
                    .map(|(tr, sr)| tr.iter().chain(sr).copied().collect())
                    .collect();
                let penalties: Vec<f64> = trend_penalties
                    .iter()
                    .chain(&seasonal_penalties)
                    .copied()
                    .collect();
                let mut coefficients = ridge_least_squares(&rows, &y, &penalties)
                    .map_err(|e| ForecastError::fit(MODEL_NAME, e.to_string()))?;
                let seasonal = coefficients.split_off(trend_penalties.len());
                (coefficients, seasonal)
            }
        };

        let mut fitted = FittedProphet {
            start,
            span_days,
            last_timestamp,
            step,
            n_obs: training.len(),
            y_scale,
            changepoints,
            seasonalities,
            trend_coefficients,
            seasonal_coefficients,
            multiplicative,
            sigma: 0.0,
        };

        let sum_squared: f64 = days
            .iter()
            .zip(&y)
            .map(|(&d, &observed)| {
                let (trend, seasonal) = fitted.components(d);
                (observed - fitted.combine(trend, seasonal)).powi(2)
            })
            .sum();
        fitted.sigma = (sum_squared / y.len() as f64).sqrt();
        if !fitted.sigma.is_finite() {
            return Err(ForecastError::fit(MODEL_NAME, "residual variance is not finite"));
        }

        debug!(
            points = fitted.n_obs,
            changepoints = fitted.changepoints.len(),
            seasonalities = fitted.seasonalities.len(),
            multiplicative,
            sigma = fitted.sigma * y_scale,
            "Fitted prophet model"
        );
        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, periods: usize) -> Result<ForecastResult> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::ModelNotFitted(MODEL_NAME.to_string()))?;

        let timestamps =
            future_timestamps(MODEL_NAME, fitted.last_timestamp, fitted.step, periods)?;
        let z = z_score(self.config.interval_width);

        let mut values = Vec::with_capacity(periods);
        let mut intervals = Vec::with_capacity(periods);
        for (h, &ts) in timestamps.iter().enumerate() {
            let (trend, seasonal) = fitted.components(days_since(fitted.start, ts));
            let centre = fitted.combine(trend, seasonal);
            let spread = (1.0 + (h + 1) as f64 / fitted.n_obs as f64).sqrt();
            let margin = z * fitted.sigma * spread;

            values.push(self.from_model_space(centre * fitted.y_scale));
            intervals.push((
                self.from_model_space((centre - margin) * fitted.y_scale),
                self.from_model_space((centre + margin) * fitted.y_scale),
            ));
        }

        ForecastResult::new(MODEL_NAME, &timestamps, &values, &intervals)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

/// Two-stage multiplicative fit: the trend first, then seasonality on the
/// relative deviation from it. `None` when the trend is not strictly positive.
fn fit_multiplicative(
    trend_rows: &[Vec<f64>],
    seasonal_rows: &[Vec<f64>],
    y: &[f64],
    trend_penalties: &[f64],
    seasonal_penalties: &[f64],
) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
    let trend_coefficients = ridge_least_squares(trend_rows, y, trend_penalties)
        .map_err(|e| ForecastError::fit(MODEL_NAME, e.to_string()))?;
    let trend: Vec<f64> = trend_rows
        .iter()
        .map(|row| dot(row, &trend_coefficients))
        .collect();
    if trend.iter().any(|&g| g <= 1e-6) {
        return Ok(None);
    }

    let relative: Vec<f64> = y.iter().zip(&trend).map(|(v, g)| v / g - 1.0).collect();
    let seasonal_coefficients = ridge_least_squares(seasonal_rows, &relative, seasonal_penalties)
        .map_err(|e| ForecastError::fit(MODEL_NAME, e.to_string()))?;
    Ok(Some((trend_coefficients, seasonal_coefficients)))
}

/// Changepoints at evenly spaced observations within the first
/// `range` share of the history.
fn place_changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let in_range = ((t.len() as f64) * range).floor() as usize;
    let count = n_changepoints.min(in_range.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last_index = (in_range - 1) as f64;
    let mut changepoints: Vec<f64> = (1..=count)
        .map(|i| t[(i as f64 * last_index / count as f64).round() as usize])
        .collect();
    changepoints.dedup();
    changepoints
}

fn trend_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|&c| (t - c).max(0.0)));
    row
}

fn seasonal_row(days: f64, seasonalities: &[Seasonality]) -> Vec<f64> {
    let mut row = Vec::new();
    for seasonality in seasonalities {
        seasonality.features(days, &mut row);
    }
    row
}

fn days_since(start: DateTime<Utc>, ts: DateTime<Utc>) -> f64 {
    (ts - start).num_milliseconds() as f64 / 86_400_000.0
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
