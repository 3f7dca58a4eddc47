//! Tiered model selection.
//!
//! The selector profiles the series and then takes exactly one path:
//!
//! | points                         | path              | confidence |
//! |--------------------------------|-------------------|------------|
//! | `< min_points`                 | insufficient data | very low   |
//! | `< full_evaluation_points`     | quick selection   | medium     |
//! | otherwise, or when forced      | full evaluation   | high       |
//!
//! Any path whose statistical models all fail ends in the fallback, which
//! reports the simple forecaster with very low confidence and the failure
//! messages as the reason. [`SmartModelSelector::select_best_model`] never
//! returns an error.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{MetricType, SelectorConfig};
use crate::data::{RawObservation, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::evaluator::{ComparisonResult, EvaluationRecord, ModelPerformanceEvaluator};
use crate::models::arima::{ArimaConfig, ArimaModel};
use crate::models::prophet::{ProphetConfig, ProphetModel};
use crate::models::simple::{SimpleForecaster, SIMPLE_FORECAST};
use crate::models::{ForecastModel, ForecastResult, ModelFamily};
use crate::quality::{assess_data_quality, DataQualityAssessment};
use crate::utils::train_test_split;

/// How much the selection can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    VeryLow,
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::VeryLow => "very_low",
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// Terminal state the selection reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPath {
    InsufficientData,
    QuickSelection,
    FullEvaluation,
    Fallback,
}

/// Caller parameters of one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub metric_type: MetricType,
    /// Steps to forecast with the selected model; zero skips the forecast
    pub forecast_periods: usize,
    /// Run the full evaluation regardless of the series length
    pub force_evaluation: bool,
}

impl Default for SelectionRequest {
    fn default() -> Self {
        Self {
            metric_type: MetricType::General,
            forecast_periods: 30,
            force_evaluation: false,
        }
    }
}

impl SelectionRequest {
    pub fn new(metric_type: MetricType) -> Self {
        Self {
            metric_type,
            ..Self::default()
        }
    }

    pub fn with_forecast_periods(mut self, forecast_periods: usize) -> Self {
        self.forecast_periods = forecast_periods;
        self
    }

    pub fn with_force_evaluation(mut self, force_evaluation: bool) -> Self {
        self.force_evaluation = force_evaluation;
        self
    }
}

/// Outcome of a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_model_name: String,
    pub selection_reason: String,
    pub data_quality: DataQualityAssessment,
    pub confidence: Confidence,
    pub selection_path: SelectionPath,
    /// Present on the full evaluation path only
    pub evaluation_records: Option<Vec<EvaluationRecord>>,
    pub comparison_result: Option<ComparisonResult>,
    /// Forecast of the selected model over the full series
    pub forecast: Option<ForecastResult>,
}

/// Builds unfitted models for the selector.
pub trait ModelProvider {
    fn build(&self, family: ModelFamily, metric_type: MetricType) -> Box<dyn ForecastModel>;
}

/// The Prophet-style and ARIMA models with their per-metric presets.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalModels {
    interval_width: f64,
    search_budget: Option<Duration>,
}

impl StatisticalModels {
    pub fn from_config(config: &SelectorConfig) -> Self {
        Self {
            interval_width: config.interval_width,
            search_budget: config.search_budget(),
        }
    }
}

impl Default for StatisticalModels {
    fn default() -> Self {
        Self::from_config(&SelectorConfig::default())
    }
}

impl ModelProvider for StatisticalModels {
    fn build(&self, family: ModelFamily, metric_type: MetricType) -> Box<dyn ForecastModel> {
        match family {
            ModelFamily::Prophet => Box::new(ProphetModel::new(
                ProphetConfig::for_metric(metric_type).with_interval_width(self.interval_width),
            )),
            ModelFamily::Arima => Box::new(ArimaModel::new(
                ArimaConfig::for_metric(metric_type)
                    .with_interval_width(self.interval_width)
                    .with_search_budget(self.search_budget),
            )),
        }
    }
}

/// Result of fitting one family.
enum FitOutcome {
    Fitted(Box<dyn ForecastModel>),
    InsufficientData(String),
    LibraryFailure(String),
}

/// Chooses between the statistical model families for a series.
///
/// Holds no mutable state; one selector can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct SmartModelSelector<P = StatisticalModels> {
    config: SelectorConfig,
    provider: P,
    evaluator: ModelPerformanceEvaluator,
}

impl SmartModelSelector<StatisticalModels> {
    pub fn new(config: SelectorConfig) -> Self {
        let provider = StatisticalModels::from_config(&config);
        Self::with_provider(config, provider)
    }
}

impl Default for SmartModelSelector<StatisticalModels> {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl<P: ModelProvider> SmartModelSelector<P> {
    pub fn with_provider(config: SelectorConfig, provider: P) -> Self {
        let evaluator = ModelPerformanceEvaluator::from_config(&config);
        Self {
            config,
            provider,
            evaluator,
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Validate raw caller input, then select.
    ///
    /// Errors only for malformed input: unparseable timestamps, non-numeric
    /// values or a zero forecast horizon. Unknown metric types are treated
    /// as `general`.
    pub fn select_from_raw(
        &self,
        raw: &[RawObservation],
        metric_type: &str,
        forecast_periods: usize,
        force_evaluation: bool,
    ) -> Result<SelectionResult> {
        if forecast_periods == 0 {
            return Err(ForecastError::InvalidParameter(
                "forecast_periods must be positive".to_string(),
            ));
        }
        let series = TimeSeries::from_raw(raw)?;
        let request = SelectionRequest {
            metric_type: MetricType::parse_lenient(metric_type),
            forecast_periods,
            force_evaluation,
        };
        Ok(self.select_best_model(&series, &request))
    }

    /// Pick a model for `series`.
    pub fn select_best_model(
        &self,
        series: &TimeSeries,
        request: &SelectionRequest,
    ) -> SelectionResult {
        let quality = assess_data_quality(series, &self.config);
        info!(
            points = quality.point_count,
            quality_score = quality.quality_score,
            metric_type = %request.metric_type,
            force_evaluation = request.force_evaluation,
            "Starting model selection"
        );

        let n = series.len();
        if n < self.config.min_points {
            let reason = format!(
                "Insufficient data: {n} points, at least {} are needed for statistical models",
                self.config.min_points
            );
            info!(path = "insufficient_data", "{reason}");
            return self.simple_result(series, request, quality, SelectionPath::InsufficientData, reason);
        }

        if request.force_evaluation || n >= self.config.full_evaluation_points {
            self.full_evaluation(series, request, quality)
        } else {
            self.quick_selection(series, request, quality)
        }
    }

    /// Fit Prophet, then ARIMA, and take the first that succeeds.
    fn quick_selection(
        &self,
        series: &TimeSeries,
        request: &SelectionRequest,
        quality: DataQualityAssessment,
    ) -> SelectionResult {
        info!(path = "quick_selection", points = series.len(), "Selecting without holdout");

        let mut failures = Vec::new();
        for family in ModelFamily::ALL {
            match self.fit_family(family, request.metric_type, series) {
                FitOutcome::Fitted(model) => {
                    let forecast = match try_forecast(model.as_ref(), request.forecast_periods) {
                        Ok(forecast) => forecast,
                        Err(e) => {
                            warn!(model = family.name(), error = %e, "Forecast failed");
                            failures.push(format!("{family}: {e}"));
                            continue;
                        }
                    };
                    info!(model = family.name(), "Quick selection succeeded");
                    return SelectionResult {
                        selected_model_name: family.name().to_string(),
                        selection_reason: format!(
                            "Quick selection: {family} fitted {} points; a comparative evaluation needs {}",
                            series.len(),
                            self.config.full_evaluation_points
                        ),
                        data_quality: quality,
                        confidence: Confidence::Medium,
                        selection_path: SelectionPath::QuickSelection,
                        evaluation_records: None,
                        comparison_result: None,
                        forecast,
                    };
                }
                FitOutcome::InsufficientData(message) | FitOutcome::LibraryFailure(message) => {
                    failures.push(message)
                }
            }
        }

        self.fallback(series, request, quality, &failures)
    }

    /// Fit both families on a training split, score them on the holdout and
    /// pick the lowest MAE.
    fn full_evaluation(
        &self,
        series: &TimeSeries,
        request: &SelectionRequest,
        quality: DataQualityAssessment,
    ) -> SelectionResult {
        let (train, test) = train_test_split(series, self.config.test_fraction);
        info!(
            path = "full_evaluation",
            train = train.len(),
            test = test.len(),
            "Evaluating all model families"
        );

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for family in ModelFamily::ALL {
            match self.fit_family(family, request.metric_type, &train) {
                FitOutcome::Fitted(model) => {
                    match self
                        .evaluator
                        .evaluate_model(model.as_ref(), &train, &test, family.name())
                    {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            warn!(model = family.name(), error = %e, "Evaluation failed");
                            failures.push(e.to_string());
                        }
                    }
                }
                FitOutcome::InsufficientData(message) | FitOutcome::LibraryFailure(message) => {
                    failures.push(message)
                }
            }
        }

        if records.is_empty() {
            return self.fallback(series, request, quality, &failures);
        }
        let comparison = match self.evaluator.compare_models(&records) {
            Ok(comparison) => comparison,
            Err(e) => {
                failures.push(e.to_string());
                return self.fallback(series, request, quality, &failures);
            }
        };

        let best = comparison.overall_best_model.clone();
        let best_mae = records
            .iter()
            .find(|r| r.model_name == best)
            .map_or(f64::INFINITY, |r| r.accuracy_metrics.mae);

        let mut selection_reason = format!(
            "Full evaluation of {}: {best} had the lowest MAE ({best_mae:.4}) over a {}-point holdout",
            comparison.models_compared.join(", "),
            test.len()
        );
        if !failures.is_empty() {
            selection_reason.push_str(&format!("; excluded: {}", failures.join("; ")));
        }

        let forecast = ModelFamily::from_name(&best)
            .and_then(|family| self.refit_forecast(family, series, request));

        info!(model = %best, mae = best_mae, "Full evaluation selected model");
        SelectionResult {
            selected_model_name: best,
            selection_reason,
            data_quality: quality,
            confidence: Confidence::High,
            selection_path: SelectionPath::FullEvaluation,
            evaluation_records: Some(records),
            comparison_result: Some(comparison),
            forecast,
        }
    }

    fn fallback(
        &self,
        series: &TimeSeries,
        request: &SelectionRequest,
        quality: DataQualityAssessment,
        failures: &[String],
    ) -> SelectionResult {
        let reason = format!(
            "Fallback to simple forecast after model failures: {}",
            failures.join("; ")
        );
        warn!(path = "fallback", "{reason}");
        self.simple_result(series, request, quality, SelectionPath::Fallback, reason)
    }

    fn simple_result(
        &self,
        series: &TimeSeries,
        request: &SelectionRequest,
        quality: DataQualityAssessment,
        selection_path: SelectionPath,
        selection_reason: String,
    ) -> SelectionResult {
        SelectionResult {
            selected_model_name: SIMPLE_FORECAST.to_string(),
            selection_reason,
            data_quality: quality,
            confidence: Confidence::VeryLow,
            selection_path,
            evaluation_records: None,
            comparison_result: None,
            forecast: self.simple_forecast(series, request.forecast_periods),
        }
    }

    fn simple_forecast(&self, series: &TimeSeries, periods: usize) -> Option<ForecastResult> {
        if periods == 0 || series.is_empty() {
            return None;
        }
        let mut model =
            match SimpleForecaster::new(self.config.simple_forecast_alpha, self.config.interval_width) {
                Ok(model) => model,
                Err(e) => {
                    warn!(error = %e, "Simple forecaster unavailable");
                    return None;
                }
            };
        if let Err(e) = model.fit(series) {
            warn!(error = %e, "Simple forecaster fit failed");
            return None;
        }
        forecast_with(&model, periods)
    }

    /// Fit the chosen family on the whole series and forecast with it.
    fn refit_forecast(
        &self,
        family: ModelFamily,
        series: &TimeSeries,
        request: &SelectionRequest,
    ) -> Option<ForecastResult> {
        if request.forecast_periods == 0 {
            return None;
        }
        match self.fit_family(family, request.metric_type, series) {
            FitOutcome::Fitted(model) => forecast_with(model.as_ref(), request.forecast_periods),
            FitOutcome::InsufficientData(message) | FitOutcome::LibraryFailure(message) => {
                warn!(model = family.name(), error = %message, "Refit on full series failed");
                None
            }
        }
    }

    fn fit_family(&self, family: ModelFamily, metric_type: MetricType, series: &TimeSeries) -> FitOutcome {
        let mut model = self.provider.build(family, metric_type);
        match model.fit(series) {
            Ok(()) => {
                debug!(model = family.name(), points = series.len(), "Model fitted");
                FitOutcome::Fitted(model)
            }
            Err(e @ ForecastError::InsufficientData { .. }) => {
                warn!(model = family.name(), error = %e, "Not enough data to fit");
                FitOutcome::InsufficientData(format!("{family}: {e}"))
            }
            Err(e) => {
                warn!(model = family.name(), error = %e, "Model fit failed");
                FitOutcome::LibraryFailure(format!("{family}: {e}"))
            }
        }
    }
}

/// `None` for a zero horizon.
fn try_forecast(model: &dyn ForecastModel, periods: usize) -> Result<Option<ForecastResult>> {
    if periods == 0 {
        return Ok(None);
    }
    model.predict(periods).map(Some)
}

fn forecast_with(model: &dyn ForecastModel, periods: usize) -> Option<ForecastResult> {
    try_forecast(model, periods).unwrap_or_else(|e| {
        warn!(model = model.name(), error = %e, "Forecast failed");
        None
    })
}
