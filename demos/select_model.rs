use chrono::NaiveDate;
use smart_forecast::{
    assess_data_quality, MetricType, RawObservation, SelectionRequest, SelectorConfig,
    SmartModelSelector, TimeSeries,
};
use std::f64::consts::PI;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Smart Forecast: Model Selection Example");
    println!("=======================================\n");

    let config = SelectorConfig::default();
    let selector = SmartModelSelector::new(config.clone());

    // Server load with a weekly cycle, long enough for full evaluation
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid start date")?;
    let load: Vec<f64> = (0..60)
        .map(|i| 400.0 + 1.2 * i as f64 + 40.0 * (2.0 * PI * i as f64 / 7.0).sin())
        .collect();
    let series = TimeSeries::daily(start, &load)?;

    let quality = assess_data_quality(&series, &config);
    println!(
        "Data quality: {} points over {} days, score {:.2}, seasonality {}",
        quality.point_count, quality.date_range_days, quality.quality_score, quality.seasonality_detected
    );

    let request = SelectionRequest::new(MetricType::Load).with_forecast_periods(14);
    let result = selector.select_best_model(&series, &request);
    println!("\nSelected model: {} ({})", result.selected_model_name, result.confidence);
    println!("Reason: {}", result.selection_reason);

    if let Some(comparison) = &result.comparison_result {
        println!("\nHoldout comparison:");
        for performance in &comparison.performance_summary {
            println!(
                "  {:<10} MAE {:>8.3}  RMSE {:>8.3}  MAPE {:>6.2}%",
                performance.model_name, performance.mae, performance.rmse, performance.mape
            );
        }
        for recommendation in &comparison.recommendations {
            println!("  - {}", recommendation);
        }
    }

    if let Some(forecast) = &result.forecast {
        println!("\nFirst forecast points:");
        for point in forecast.points().iter().take(5) {
            println!(
                "  {}  {:>8.2}  [{:.2}, {:.2}]",
                point.timestamp.format("%Y-%m-%d"),
                point.predicted_value,
                point.lower_bound,
                point.upper_bound
            );
        }
    }

    // A short probability series goes through the quick path
    let raw: Vec<RawObservation> = (0..14)
        .map(|day| {
            let date = start + chrono::Duration::days(day);
            RawObservation::new(date.format("%Y-%m-%d").to_string(), 0.92 - 0.002 * day as f64)
        })
        .collect();
    let quick = selector.select_from_raw(&raw, "probability", 7, false)?;
    println!(
        "\nSuccess rate series: {} via {:?} ({})",
        quick.selected_model_name, quick.selection_path, quick.confidence
    );

    println!("\nFull result as JSON:\n{}", serde_json::to_string_pretty(&quick)?);
    Ok(())
}
