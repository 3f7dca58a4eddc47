mod common;

use common::{daily, linear_trend, success_rate, weekly_load};
use forecast_select::models::simple::SIMPLE_FORECAST;
use forecast_select::{
    Confidence, MetricType, SelectionPath, SelectionRequest, SelectorConfig, SmartModelSelector,
};
use pretty_assertions::assert_eq;

#[test]
fn test_five_points_use_simple_forecast() {
    let series = daily(&[3.0, 4.0, 5.0, 4.0, 6.0]);
    let selector = SmartModelSelector::default();
    let result = selector.select_best_model(&series, &SelectionRequest::new(MetricType::General));

    assert_eq!(result.selected_model_name, SIMPLE_FORECAST);
    assert_eq!(result.confidence, Confidence::VeryLow);
    assert_eq!(result.selection_path, SelectionPath::InsufficientData);
    assert!(result.comparison_result.is_none());
    assert_eq!(result.data_quality.point_count, 5);
}

#[test]
fn test_fifteen_point_trend_takes_quick_path() {
    let selector = SmartModelSelector::default();
    let result = selector.select_best_model(
        &linear_trend(15),
        &SelectionRequest::new(MetricType::General).with_forecast_periods(5),
    );

    assert_eq!(result.selection_path, SelectionPath::QuickSelection);
    assert_eq!(result.confidence, Confidence::Medium);
    assert_eq!(result.selected_model_name, "prophet");
    assert!(result.evaluation_records.is_none());

    let forecast = result.forecast.unwrap();
    assert_eq!(forecast.horizons(), 5);
    // the trend keeps rising past the last observation of 41
    assert!(forecast.values()[4] > 41.0);
}

#[test]
fn test_seasonal_load_gets_full_evaluation() {
    let selector = SmartModelSelector::default();
    let result = selector.select_best_model(
        &weekly_load(60, 42),
        &SelectionRequest::new(MetricType::Load).with_forecast_periods(14),
    );

    assert_eq!(result.selection_path, SelectionPath::FullEvaluation);
    assert_eq!(result.confidence, Confidence::High);
    assert!(result.data_quality.seasonality_detected);

    let comparison = result.comparison_result.as_ref().unwrap();
    assert_eq!(comparison.models_compared, vec!["prophet", "arima"]);
    assert_eq!(comparison.overall_best_model, result.selected_model_name);
    assert_eq!(comparison.recommendations.len(), 2);

    let records = result.evaluation_records.as_ref().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.test_period.period_count == 12));

    let forecast = result.forecast.as_ref().unwrap();
    assert_eq!(forecast.horizons(), 14);
    assert_eq!(forecast.model_name(), result.selected_model_name);
}

#[test]
fn test_selection_is_repeatable() {
    let selector = SmartModelSelector::default();
    let series = weekly_load(45, 7);
    let request = SelectionRequest::new(MetricType::General);

    let first = selector.select_best_model(&series, &request);
    let second = selector.select_best_model(&series, &request);
    assert_eq!(first.selected_model_name, second.selected_model_name);
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.forecast, second.forecast);
}

#[test]
fn test_probability_forecast_is_bounded() {
    let selector = SmartModelSelector::default();
    let result = selector.select_best_model(
        &success_rate(40, 3),
        &SelectionRequest::new(MetricType::Probability).with_forecast_periods(30),
    );

    assert_eq!(result.confidence, Confidence::High);
    for point in result.forecast.unwrap().points() {
        assert!(point.lower_bound >= 0.0 && point.upper_bound <= 1.0, "{point:?}");
    }
}

#[test]
fn test_custom_thresholds_move_the_tiers() {
    let config = SelectorConfig {
        min_points: 5,
        full_evaluation_points: 12,
        ..SelectorConfig::default()
    };
    let selector = SmartModelSelector::new(config);

    let result = selector.select_best_model(&linear_trend(8), &SelectionRequest::default());
    // past the selector floor but under the fitting floor of both models
    assert_eq!(result.selection_path, SelectionPath::Fallback);
    assert_eq!(result.confidence, Confidence::VeryLow);
    assert!(result.selection_reason.contains("Insufficient data"));

    let result = selector.select_best_model(&linear_trend(15), &SelectionRequest::default());
    assert_eq!(result.selection_path, SelectionPath::FullEvaluation);
    assert_eq!(result.confidence, Confidence::High);
}

#[test]
fn test_concurrent_selections() {
    let selector = SmartModelSelector::default();
    let series = weekly_load(30, 5);
    let request = SelectionRequest::new(MetricType::Load).with_forecast_periods(7);
    let expected = selector.select_best_model(&series, &request);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| selector.select_best_model(&series, &request)))
            .collect();
        for handle in handles {
            let result = handle.join().unwrap();
            assert_eq!(result.selected_model_name, expected.selected_model_name);
            assert_eq!(result.confidence, expected.confidence);
        }
    });
}

#[test]
fn test_horizon_past_last_date_falls_back() {
    let start = chrono::NaiveDate::MAX - chrono::Duration::days(12);
    let values: Vec<f64> = (0..12).map(f64::from).collect();
    let series = forecast_select::TimeSeries::daily(start, &values).unwrap();

    let selector = SmartModelSelector::default();
    let request = SelectionRequest::new(MetricType::General).with_forecast_periods(3);
    let result = selector.select_best_model(&series, &request);

    assert_eq!(result.selection_path, SelectionPath::Fallback);
    assert_eq!(result.selected_model_name, SIMPLE_FORECAST);
    assert_eq!(result.confidence, Confidence::VeryLow);
    assert!(result.selection_reason.contains("overflows the calendar"));
    assert!(result.forecast.is_none());

    let one_step = SelectionRequest::new(MetricType::General).with_forecast_periods(1);
    let result = selector.select_best_model(&series, &one_step);
    assert_eq!(result.selection_path, SelectionPath::QuickSelection);
    assert_eq!(result.forecast.map(|f| f.horizons()), Some(1));
}
