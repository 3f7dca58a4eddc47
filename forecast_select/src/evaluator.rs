//! Holdout evaluation and comparison of fitted models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use forecast_math::{calculate_accuracy_metrics, serde_float, AccuracyMetrics};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SelectorConfig;
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::ForecastModel;
use crate::utils::SeriesSummary;

/// Metrics ranked in a comparison and whether higher is better.
const RANKED_METRICS: [(&str, bool); 4] = [
    ("mae", false),
    ("rmse", false),
    ("mape", false),
    ("r2", true),
];

/// Span of the holdout a model was scored on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub period_count: usize,
}

/// Holdout performance of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub model_name: String,
    pub training_points: usize,
    pub test_period: TestPeriod,
    pub accuracy_metrics: AccuracyMetrics,
    pub predictions_summary: SeriesSummary,
    pub actual_summary: SeriesSummary,
}

/// Headline metrics of one model within a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub model_name: String,
    #[serde(with = "serde_float")]
    pub mae: f64,
    #[serde(with = "serde_float")]
    pub rmse: f64,
    #[serde(with = "serde_float")]
    pub mape: f64,
    #[serde(with = "serde_float")]
    pub r_squared: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub models_compared: Vec<String>,
    /// Metric name to winning model
    pub best_model_per_metric: BTreeMap<String, String>,
    /// Lowest MAE, first model on ties
    pub overall_best_model: String,
    pub performance_summary: Vec<ModelPerformance>,
    pub recommendations: Vec<String>,
}

/// Scores fitted models on a holdout and ranks the results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPerformanceEvaluator {
    excellent_mae_threshold: f64,
    good_mae_threshold: f64,
}

impl Default for ModelPerformanceEvaluator {
    fn default() -> Self {
        Self::from_config(&SelectorConfig::default())
    }
}

impl ModelPerformanceEvaluator {
    pub fn new(excellent_mae_threshold: f64, good_mae_threshold: f64) -> Self {
        Self {
            excellent_mae_threshold,
            good_mae_threshold,
        }
    }

    pub fn from_config(config: &SelectorConfig) -> Self {
        Self::new(config.excellent_mae_threshold, config.good_mae_threshold)
    }

    /// Forecast over the test period and score against the actual values.
    ///
    /// An empty test set yields sentinel metrics without calling the model.
    pub fn evaluate_model(
        &self,
        model: &dyn ForecastModel,
        train: &TimeSeries,
        test: &TimeSeries,
        model_name: &str,
    ) -> Result<EvaluationRecord> {
        let actual = test.values();
        let (predicted, accuracy_metrics) = if test.is_empty() {
            debug!(model = model_name, "Empty test set, reporting sentinel metrics");
            (Vec::new(), AccuracyMetrics::undefined())
        } else {
            let forecast = model.predict(test.len())?;
            let predicted = forecast.values();
            let metrics = calculate_accuracy_metrics(&actual, &predicted);
            (predicted, metrics)
        };

        debug!(
            model = model_name,
            mae = accuracy_metrics.mae,
            rmse = accuracy_metrics.rmse,
            test_points = test.len(),
            "Evaluated model"
        );

        Ok(EvaluationRecord {
            model_name: model_name.to_string(),
            training_points: train.len(),
            test_period: TestPeriod {
                start: test.first().map(|p| p.timestamp),
                end: test.last().map(|p| p.timestamp),
                period_count: test.len(),
            },
            accuracy_metrics,
            predictions_summary: SeriesSummary::of(&predicted),
            actual_summary: SeriesSummary::of(&actual),
        })
    }

    /// Rank evaluated models. Records are compared in the order given.
    pub fn compare_models(&self, records: &[EvaluationRecord]) -> Result<ComparisonResult> {
        let first = records.first().ok_or_else(|| {
            ForecastError::InvalidParameter("No evaluation records to compare".to_string())
        })?;

        let mut best_model_per_metric = BTreeMap::new();
        for (metric, higher_is_better) in RANKED_METRICS {
            let mut best = first;
            for record in &records[1..] {
                let candidate = metric_value(record, metric);
                let current = metric_value(best, metric);
                let better = if higher_is_better {
                    candidate > current
                } else {
                    candidate < current
                };
                if better {
                    best = record;
                }
            }
            best_model_per_metric.insert(metric.to_string(), best.model_name.clone());
        }

        let overall = records.iter().fold(first, |best, record| {
            if record.accuracy_metrics.mae < best.accuracy_metrics.mae {
                record
            } else {
                best
            }
        });

        let performance_summary = records
            .iter()
            .map(|r| ModelPerformance {
                model_name: r.model_name.clone(),
                mae: r.accuracy_metrics.mae,
                rmse: r.accuracy_metrics.rmse,
                mape: r.accuracy_metrics.mape,
                r_squared: r.accuracy_metrics.r_squared,
            })
            .collect();

        let recommendations = self.recommendations(records.len(), overall, &best_model_per_metric);

        info!(
            best = %overall.model_name,
            mae = overall.accuracy_metrics.mae,
            compared = records.len(),
            "Compared models"
        );

        Ok(ComparisonResult {
            models_compared: records.iter().map(|r| r.model_name.clone()).collect(),
            best_model_per_metric,
            overall_best_model: overall.model_name.clone(),
            performance_summary,
            recommendations,
        })
    }

    fn recommendations(
        &self,
        compared: usize,
        best: &EvaluationRecord,
        best_per_metric: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let name = &best.model_name;
        let mae = best.accuracy_metrics.mae;

        let accuracy = if mae < self.excellent_mae_threshold {
            format!("{name} shows excellent accuracy (MAE {mae:.4}) and is ready for use")
        } else if mae < self.good_mae_threshold {
            format!("{name} shows good accuracy (MAE {mae:.4}); monitor its performance in production")
        } else {
            format!(
                "{name} accuracy could be improved (MAE {mae:.4}); consider more history or additional features"
            )
        };

        let consistency = if compared < 2 {
            format!("Only {name} could be evaluated, so no cross-model comparison was possible")
        } else if best_per_metric.values().all(|winner| winner == name) {
            format!("{name} is best on every metric, the model choice is consistent")
        } else {
            "Different models win different metrics; consider an ensemble of them".to_string()
        };

        vec![accuracy, consistency]
    }
}

fn metric_value(record: &EvaluationRecord, metric: &str) -> f64 {
    record.accuracy_metrics.get(metric).unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::simple::SimpleForecaster;
    use crate::utils::train_test_split;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(name: &str, mae: f64, rmse: f64, mape: f64, r_squared: f64) -> EvaluationRecord {
        EvaluationRecord {
            model_name: name.to_string(),
            training_points: 16,
            test_period: TestPeriod {
                start: None,
                end: None,
                period_count: 4,
            },
            accuracy_metrics: AccuracyMetrics {
                mae,
                rmse,
                mape,
                r_squared,
                ..AccuracyMetrics::undefined()
            },
            predictions_summary: SeriesSummary::of(&[]),
            actual_summary: SeriesSummary::of(&[]),
        }
    }

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::daily(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), values).unwrap()
    }

    #[test]
    fn test_overall_best_is_lowest_mae() {
        let records = vec![
            record("prophet", 0.15, 0.10, 1.0, 0.9),
            record("arima", 0.10, 0.30, 5.0, 0.1),
        ];
        let comparison = ModelPerformanceEvaluator::default()
            .compare_models(&records)
            .unwrap();

        assert_eq!(comparison.overall_best_model, "arima");
        assert_eq!(comparison.best_model_per_metric["mae"], "arima");
        assert_eq!(comparison.best_model_per_metric["rmse"], "prophet");
        assert_eq!(comparison.best_model_per_metric["mape"], "prophet");
        assert_eq!(comparison.best_model_per_metric["r2"], "prophet");
        assert_eq!(comparison.models_compared, vec!["prophet", "arima"]);
        assert!(comparison.recommendations[1].contains("ensemble"));
    }

    #[test]
    fn test_tie_goes_to_first_record() {
        let records = vec![
            record("prophet", 0.2, 0.2, 1.0, 0.5),
            record("arima", 0.2, 0.2, 1.0, 0.5),
        ];
        let comparison = ModelPerformanceEvaluator::default()
            .compare_models(&records)
            .unwrap();
        assert_eq!(comparison.overall_best_model, "prophet");
        assert!(comparison.best_model_per_metric.values().all(|m| m == "prophet"));
        assert!(comparison.recommendations[1].contains("consistent"));
    }

    #[test]
    fn test_recommendation_bands() {
        let evaluator = ModelPerformanceEvaluator::new(0.05, 0.1);
        let excellent = evaluator.compare_models(&[record("a", 0.01, 0.0, 0.0, 0.0)]).unwrap();
        assert!(excellent.recommendations[0].contains("excellent"));
        assert!(excellent.recommendations[1].contains("Only a"));

        let good = evaluator.compare_models(&[record("a", 0.07, 0.0, 0.0, 0.0)]).unwrap();
        assert!(good.recommendations[0].contains("monitor"));

        let poor = evaluator.compare_models(&[record("a", 0.5, 0.0, 0.0, 0.0)]).unwrap();
        assert!(poor.recommendations[0].contains("could be improved"));
    }

    #[test]
    fn test_infinite_mape_never_wins() {
        let records = vec![
            record("prophet", 0.3, 0.3, f64::INFINITY, 0.0),
            record("arima", 0.4, 0.4, 12.0, 0.0),
        ];
        let comparison = ModelPerformanceEvaluator::default()
            .compare_models(&records)
            .unwrap();
        assert_eq!(comparison.best_model_per_metric["mape"], "arima");
    }

    #[test]
    fn test_compare_requires_records() {
        assert!(ModelPerformanceEvaluator::default().compare_models(&[]).is_err());
    }

    #[test]
    fn test_evaluate_model_on_holdout() {
        let data = series(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 9.0]);
        let (train, test) = train_test_split(&data, 0.2);
        let mut model = SimpleForecaster::new(0.3, 0.95).unwrap();
        model.fit(&train).unwrap();

        let record = ModelPerformanceEvaluator::default()
            .evaluate_model(&model, &train, &test, "simple_forecast")
            .unwrap();
        assert_eq!(record.training_points, 8);
        assert_eq!(record.test_period.period_count, 2);
        assert_eq!(record.test_period.start, test.first().map(|p| p.timestamp));
        assert_eq!(record.accuracy_metrics.mae, 1.0);
        assert_eq!(record.actual_summary.mean, 10.0);
    }

    #[test]
    fn test_empty_test_set_gives_sentinels() {
        let data = series(&[1.0, 2.0, 3.0]);
        let model = SimpleForecaster::new(0.3, 0.95).unwrap();
        // never fitted: an empty holdout must not reach predict
        let record = ModelPerformanceEvaluator::default()
            .evaluate_model(&model, &data, &TimeSeries::default(), "simple_forecast")
            .unwrap();
        assert_eq!(record.accuracy_metrics.mae, f64::INFINITY);
        assert_eq!(record.accuracy_metrics.r_squared, 0.0);
        assert_eq!(record.test_period.period_count, 0);
    }

    #[test]
    fn test_unfitted_model_is_an_error() {
        let data = series(&[1.0, 2.0, 3.0]);
        let model = SimpleForecaster::new(0.3, 0.95).unwrap();
        let result = ModelPerformanceEvaluator::default().evaluate_model(&model, &data, &data, "x");
        assert!(matches!(result, Err(ForecastError::ModelNotFitted(_))));
    }

    #[test]
    fn test_comparison_serializes_infinite_metrics() {
        let comparison = ModelPerformanceEvaluator::default()
            .compare_models(&[record("a", 0.2, 0.2, f64::INFINITY, 0.0)])
            .unwrap();
        let json = serde_json::to_string(&comparison).unwrap();
        assert!(json.contains("\"Infinity\""));
    }
}
