//! Serde adapter that keeps non-finite floats representable in JSON.
//!
//! Finite values are written as numbers; `+∞`, `-∞` and NaN are written as the
//! strings `"Infinity"`, `"-Infinity"` and `"NaN"`. Use with
//! `#[serde(with = "forecast_math::serde_float")]`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if value.is_sign_positive() {
        serializer.serialize_str("Infinity")
    } else {
        serializer.serialize_str("-Infinity")
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(v) => Ok(v),
        Repr::Text(text) => match text.as_str() {
            "Infinity" | "+Infinity" | "inf" => Ok(f64::INFINITY),
            "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
            "NaN" | "nan" => Ok(f64::NAN),
            other => Err(D::Error::custom(format!(
                "expected a number or Infinity/-Infinity/NaN, got {other:?}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::serde_float;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "serde_float")]
        value: f64,
    }

    #[test]
    fn test_finite_values_stay_numbers() {
        let json = serde_json::to_string(&Wrapper { value: 1.5 }).unwrap();
        assert_eq!(json, r#"{"value":1.5}"#);
    }

    #[test]
    fn test_non_finite_values_become_strings() {
        let json = serde_json::to_string(&Wrapper {
            value: f64::NEG_INFINITY,
        })
        .unwrap();
        assert_eq!(json, r#"{"value":"-Infinity"}"#);

        let back: Wrapper = serde_json::from_str(r#"{"value":"NaN"}"#).unwrap();
        assert!(back.value.is_nan());
    }

    #[test]
    fn test_rejects_other_strings() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":"lots"}"#).is_err());
    }
}
