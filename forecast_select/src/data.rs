//! Time series input handling: coercion, validation and loading.
//!
//! A [`TimeSeries`] is always sorted ascending by timestamp with no duplicate
//! timestamps and only finite values. Every constructor enforces this, so the
//! rest of the crate can rely on it.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ForecastError, Result};

/// A single observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Observation at midnight UTC of `date`.
    pub fn on_date(date: NaiveDate, value: f64) -> Self {
        Self::new(midnight_utc(date), value)
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDateTime::new(date, NaiveTime::MIN))
}

/// A date-like input value as received from callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateInput {
    /// ISO-8601 date (`2024-01-31`), datetime (`2024-01-31T12:00:00`,
    /// `2024-01-31 12:00:00`) or RFC 3339 string
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl DateInput {
    /// Resolve to a UTC timestamp.
    pub fn resolve(&self) -> Result<DateTime<Utc>> {
        match self {
            DateInput::Date(date) => Ok(midnight_utc(*date)),
            DateInput::DateTime(dt) => Ok(*dt),
            DateInput::Text(text) => parse_timestamp(text),
        }
    }
}

impl From<&str> for DateInput {
    fn from(value: &str) -> Self {
        DateInput::Text(value.to_string())
    }
}

impl From<String> for DateInput {
    fn from(value: String) -> Self {
        DateInput::Text(value)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(value: NaiveDate) -> Self {
        DateInput::Date(value)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(value: DateTime<Utc>) -> Self {
        DateInput::DateTime(value)
    }
}

/// Parse the timestamp formats accepted at the input boundary.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(midnight_utc(date));
    }

    Err(ForecastError::DataValidation(format!(
        "Unrecognised timestamp: {text:?}"
    )))
}

/// A numeric input value as received from callers.
///
/// `null` and empty strings are missing values; numeric strings are coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueInput {
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ValueInput {
    /// Coerce to a float. `Ok(None)` marks a missing value.
    pub fn resolve(&self) -> Result<Option<f64>> {
        match self {
            ValueInput::Missing => Ok(None),
            ValueInput::Integer(i) => Ok(Some(*i as f64)),
            ValueInput::Float(f) => finite_or_missing(*f, &f.to_string()),
            ValueInput::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                let parsed: f64 = trimmed.parse().map_err(|_| {
                    ForecastError::DataValidation(format!("Non-numeric value: {text:?}"))
                })?;
                finite_or_missing(parsed, trimmed)
            }
        }
    }
}

fn finite_or_missing(value: f64, raw: &str) -> Result<Option<f64>> {
    if value.is_nan() {
        Ok(None)
    } else if value.is_infinite() {
        Err(ForecastError::DataValidation(format!(
            "Non-finite value: {raw}"
        )))
    } else {
        Ok(Some(value))
    }
}

impl From<f64> for ValueInput {
    fn from(value: f64) -> Self {
        ValueInput::Float(value)
    }
}

impl From<i64> for ValueInput {
    fn from(value: i64) -> Self {
        ValueInput::Integer(value)
    }
}

impl From<i32> for ValueInput {
    fn from(value: i32) -> Self {
        ValueInput::Integer(value.into())
    }
}

impl From<&str> for ValueInput {
    fn from(value: &str) -> Self {
        ValueInput::Text(value.to_string())
    }
}

impl<T: Into<ValueInput>> From<Option<T>> for ValueInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(ValueInput::Missing, Into::into)
    }
}

/// One unvalidated `{timestamp, value}` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub timestamp: DateInput,
    pub value: ValueInput,
}

impl RawObservation {
    pub fn new(timestamp: impl Into<DateInput>, value: impl Into<ValueInput>) -> Self {
        Self {
            timestamp: timestamp.into(),
            value: value.into(),
        }
    }
}

/// Validated, time-ordered series of observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    points: Vec<TimeSeriesPoint>,
    /// Observations dropped because their value was missing
    missing_count: usize,
}

impl TimeSeries {
    /// Build a series, sorting by timestamp and keeping the last of any
    /// duplicated timestamp.
    pub fn new(points: Vec<TimeSeriesPoint>) -> Result<Self> {
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(ForecastError::DataValidation(format!(
                "Non-finite value {} at {}",
                bad.value, bad.timestamp
            )));
        }

        let mut points = points;
        points.sort_by_key(|p| p.timestamp);

        let before = points.len();
        let mut deduped: Vec<TimeSeriesPoint> = Vec::with_capacity(before);
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }
        if deduped.len() < before {
            warn!(
                duplicates = before - deduped.len(),
                "Dropped observations with duplicate timestamps, keeping the last"
            );
        }

        Ok(Self {
            points: deduped,
            missing_count: 0,
        })
    }

    /// Coerce raw caller input. Missing values are dropped and counted.
    pub fn from_raw(raw: &[RawObservation]) -> Result<Self> {
        let mut points = Vec::with_capacity(raw.len());
        let mut missing = 0;
        for (index, observation) in raw.iter().enumerate() {
            let timestamp = observation.timestamp.resolve().map_err(|e| {
                ForecastError::DataValidation(format!("Record {index}: {e}"))
            })?;
            match observation.value.resolve() {
                Ok(Some(value)) => points.push(TimeSeriesPoint::new(timestamp, value)),
                Ok(None) => missing += 1,
                Err(e) => {
                    return Err(ForecastError::DataValidation(format!(
                        "Record {index}: {e}"
                    )))
                }
            }
        }
        if missing > 0 {
            debug!(missing, "Dropped missing values from input");
        }

        let mut series = Self::new(points)?;
        series.missing_count = missing;
        Ok(series)
    }

    /// Build from `(timestamp, number)` pairs of any primitive numeric type.
    pub fn from_pairs<T, I>(pairs: I) -> Result<Self>
    where
        T: ToPrimitive + std::fmt::Debug,
        I: IntoIterator<Item = (DateTime<Utc>, T)>,
    {
        let points = pairs
            .into_iter()
            .map(|(timestamp, value)| {
                value
                    .to_f64()
                    .map(|v| TimeSeriesPoint::new(timestamp, v))
                    .ok_or_else(|| {
                        ForecastError::DataValidation(format!("Value {value:?} is not numeric"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(points)
    }

    /// Evenly spaced series starting at `start`.
    pub fn from_values(start: DateTime<Utc>, step: Duration, values: &[f64]) -> Result<Self> {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                i32::try_from(i)
                    .ok()
                    .and_then(|i| step.checked_mul(i))
                    .and_then(|offset| start.checked_add_signed(offset))
                    .map(|timestamp| TimeSeriesPoint::new(timestamp, v))
                    .ok_or_else(|| {
                        ForecastError::DataValidation(format!(
                            "Point {i} after {start} is outside the supported date range"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(points)
    }

    /// Daily series starting at midnight of `start`.
    pub fn daily(start: NaiveDate, values: &[f64]) -> Result<Self> {
        Self::from_values(midnight_utc(start), Duration::days(1), values)
    }

    /// Load a `date,value` CSV file.
    ///
    /// The time column is the first header mentioning a date or time (else the
    /// first column); the value column is the first header naming a value,
    /// `y`, price or close (else the second column).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let names: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        if names.len() < 2 {
            return Err(ForecastError::DataValidation(
                "CSV input needs a time column and a value column".to_string(),
            ));
        }

        let time_column = names
            .iter()
            .position(|n| n.contains("date") || n.contains("time") || n == "ds")
            .unwrap_or(0);
        let value_column = names
            .iter()
            .enumerate()
            .position(|(i, n)| {
                i != time_column
                    && (n.contains("value") || n == "y" || n.contains("price") || n.contains("close"))
            })
            .unwrap_or(if time_column == 0 { 1 } else { 0 });

        let mut raw = Vec::new();
        for record in reader.records() {
            let record = record?;
            let timestamp = record.get(time_column).unwrap_or_default();
            let value = record.get(value_column).unwrap_or_default();
            raw.push(RawObservation::new(timestamp, value));
        }

        Self::from_raw(&raw)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn first(&self) -> Option<&TimeSeriesPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TimeSeriesPoint> {
        self.points.last()
    }

    /// Number of missing values dropped while building the series.
    pub fn missing_count(&self) -> usize {
        self.missing_count
    }

    /// Sub-series of already ordered points.
    pub(crate) fn from_sorted(points: &[TimeSeriesPoint]) -> Self {
        Self {
            points: points.to_vec(),
            missing_count: 0,
        }
    }

    /// Whether the ordering invariant holds; always true for values built
    /// through the public constructors.
    pub fn is_strictly_ordered(&self) -> bool {
        self.points.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn date(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T00:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01 00:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T01:00:00+01:00").unwrap(), expected);
        assert!(parse_timestamp("March 1st").is_err());
    }

    #[test]
    fn test_value_coercion() {
        assert_eq!(ValueInput::Integer(3).resolve().unwrap(), Some(3.0));
        assert_eq!(ValueInput::from(" 2.5 ").resolve().unwrap(), Some(2.5));
        assert_eq!(ValueInput::Missing.resolve().unwrap(), None);
        assert_eq!(ValueInput::from("").resolve().unwrap(), None);
        assert!(matches!(
            ValueInput::from("abc").resolve(),
            Err(ForecastError::DataValidation(_))
        ));
        assert!(ValueInput::Float(f64::INFINITY).resolve().is_err());
    }

    #[test]
    fn test_from_raw_sorts_dedupes_and_counts_missing() {
        let raw = vec![
            RawObservation::new("2024-01-03", 3.0),
            RawObservation::new("2024-01-01", 1),
            RawObservation::new("2024-01-02", ValueInput::Missing),
            RawObservation::new("2024-01-03", "4.0"),
        ];
        let series = TimeSeries::from_raw(&raw).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.missing_count(), 1);
        assert_eq!(series.values(), vec![1.0, 4.0]);
        assert!(series.is_strictly_ordered());
    }

    #[test]
    fn test_from_raw_rejects_non_numeric() {
        let raw = vec![
            RawObservation::new("2024-01-01", 1.0),
            RawObservation::new("2024-01-02", "n/a"),
        ];
        let err = TimeSeries::from_raw(&raw).unwrap_err();
        assert!(matches!(err, ForecastError::DataValidation(_)));
        assert!(err.to_string().contains("Record 1"));
    }

    #[test]
    fn test_raw_observations_from_json() {
        let json = r#"[
            {"timestamp": "2024-01-01", "value": 1},
            {"timestamp": "2024-01-02T00:00:00Z", "value": 2.5},
            {"timestamp": "2024-01-03", "value": null},
            {"timestamp": "2024-01-04", "value": "7"}
        ]"#;
        let raw: Vec<RawObservation> = serde_json::from_str(json).unwrap();
        let series = TimeSeries::from_raw(&raw).unwrap();
        assert_eq!(series.values(), vec![1.0, 2.5, 7.0]);
        assert_eq!(series.missing_count(), 1);
    }

    #[test]
    fn test_from_pairs_accepts_integers() {
        let series = TimeSeries::from_pairs(vec![
            (date("2024-01-02"), 20_u32),
            (date("2024-01-01"), 10_u32),
        ])
        .unwrap();
        assert_eq!(series.values(), vec![10.0, 20.0]);
    }

    #[test]
    fn test_new_rejects_nan() {
        let points = vec![TimeSeriesPoint::new(date("2024-01-01"), f64::NAN)];
        assert!(TimeSeries::new(points).is_err());
    }

    #[test]
    fn test_daily_rejects_dates_past_the_calendar() {
        assert!(TimeSeries::daily(NaiveDate::MAX, &[1.0]).is_ok());
        assert!(matches!(
            TimeSeries::daily(NaiveDate::MAX, &[1.0, 2.0]),
            Err(ForecastError::DataValidation(_))
        ));
    }

    #[test]
    fn test_from_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "date,price").unwrap();
        writeln!(file, "2023-01-02,102.0").unwrap();
        writeln!(file, "2023-01-01,100.0").unwrap();
        writeln!(file, "2023-01-03,").unwrap();
        writeln!(file, "2023-01-04,104").unwrap();

        let series = TimeSeries::from_csv(file.path()).unwrap();
        assert_eq!(series.values(), vec![100.0, 102.0, 104.0]);
        assert_eq!(series.missing_count(), 1);
    }

    #[test]
    fn test_from_csv_rejects_text_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ds,y").unwrap();
        writeln!(file, "2023-01-01,high").unwrap();
        assert!(matches!(
            TimeSeries::from_csv(file.path()),
            Err(ForecastError::DataValidation(_))
        ));
    }
}
