//! Custom serde helpers for exchange wire formats.
//!
//! The exchange is inconsistent about numeric encoding: prices usually arrive
//! as strings, sizes as integers, and some fields as floats. Timestamps are
//! Unix microseconds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl Numeric {
    fn to_decimal(&self) -> Result<Decimal, String> {
        match self {
            Numeric::Int(v) => Ok(Decimal::from(*v)),
            Numeric::UInt(v) => Ok(Decimal::from(*v)),
            Numeric::Float(v) => {
                Decimal::from_str(&v.to_string()).map_err(|e| format!("{}: {}", v, e))
            }
            Numeric::Str(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .map_err(|e| format!("{:?}: {}", s, e))
            }
        }
    }

    fn to_i64(&self) -> Result<i64, String> {
        match self {
            Numeric::Int(v) => Ok(*v),
            Numeric::UInt(v) => i64::try_from(*v).map_err(|e| e.to_string()),
            Numeric::Float(v) => Ok(*v as i64),
            Numeric::Str(s) => s.trim().parse::<i64>().map_err(|e| e.to_string()),
        }
    }
}

/// `Decimal` from a string or number.
pub mod decimal {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        Numeric::deserialize(deserializer)?
            .to_decimal()
            .map_err(serde::de::Error::custom)
    }
}

/// `Option<Decimal>` from a string, number, `null` or empty string.
/// Use with `#[serde(default)]` so a missing field becomes `None`.
pub mod decimal_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Numeric>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Numeric::Str(s)) if s.trim().is_empty() => Ok(None),
            Some(n) => n.to_decimal().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// `Option<DateTime<Utc>>` from Unix microseconds (string or number).
pub mod timestamp_us_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Numeric>::deserialize(deserializer)? {
            None => Ok(None),
            Some(n) => {
                let micros = n.to_i64().map_err(serde::de::Error::custom)?;
                DateTime::<Utc>::from_timestamp_micros(micros)
                    .map(Some)
                    .ok_or_else(|| {
                        serde::de::Error::custom(format!("Invalid timestamp: {}", micros))
                    })
            }
        }
    }
}

/// `Option<u64>` from a string or number.
pub mod u64_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Numeric>::deserialize(deserializer)? {
            None => Ok(None),
            Some(n) => {
                let v = n.to_i64().map_err(serde::de::Error::custom)?;
                u64::try_from(v).map(Some).map_err(serde::de::Error::custom)
            }
        }
    }
}

impl Numeric {
    fn into_string(self) -> String {
        match self {
            Numeric::Int(v) => v.to_string(),
            Numeric::UInt(v) => v.to_string(),
            Numeric::Float(v) => v.to_string(),
            Numeric::Str(s) => s,
        }
    }
}

/// `String` from a string or number (ids are sent either way).
pub mod string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Numeric::deserialize(deserializer)?.into_string())
    }
}

/// `Option<String>` from a string or number.
pub mod string_opt {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Numeric>::deserialize(deserializer)?.map(Numeric::into_string))
    }
}
