//! Canonical type system and value coercion.
//!
//! Source column types are mapped onto a small set of canonical types
//! (see [`super::typemap`]); each target dialect renders them as native
//! types, and every source value is coerced to its column's canonical type
//! before it is bound on the target.
//!
//! ```text
//! Source type  →  CanonicalType  →  Target type
//!  DATETIME    →    Timestamp    →  timestamp / DATETIME
//!  VARCHAR(20) →    Text         →  text / TEXT
//! ```

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use crate::core::value::{SqlNullType, SqlValue};
use crate::error::{Result, WardError};

/// Canonical type representation for cross-database type mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    /// Timestamp without timezone; values are UTC.
    Timestamp,
    Date,
    /// Exact decimal.
    Numeric,
    Boolean,
    Text,
    Integer,
    /// 64-bit floating point.
    Float,
    Binary,
    /// Source type with no canonical equivalent, rendered verbatim.
    Unmapped(String),
}

impl CanonicalType {
    /// NULL hint used when binding a NULL of this type.
    pub fn null_type(&self) -> SqlNullType {
        match self {
            CanonicalType::Timestamp => SqlNullType::DateTime,
            CanonicalType::Date => SqlNullType::Date,
            CanonicalType::Numeric => SqlNullType::Decimal,
            CanonicalType::Boolean => SqlNullType::Bool,
            CanonicalType::Text | CanonicalType::Unmapped(_) => SqlNullType::String,
            CanonicalType::Integer => SqlNullType::I64,
            CanonicalType::Float => SqlNullType::F64,
            CanonicalType::Binary => SqlNullType::Bytes,
        }
    }

    /// Coerce a source value to this canonical type.
    ///
    /// # Errors
    ///
    /// Returns `WardError::Storage` when the value cannot be represented.
    pub fn coerce(&self, value: SqlValue<'static>) -> Result<SqlValue<'static>> {
        if value.is_null() {
            return Ok(match self {
                CanonicalType::Unmapped(_) => value,
                other => SqlValue::Null(other.null_type()),
            });
        }

        let source_kind = value.null_type();
        let coerced = match (self, value) {
            (CanonicalType::Unmapped(_), v) => Some(v),

            (CanonicalType::Timestamp, v) => to_timestamp(&v).map(SqlValue::DateTime),
            (CanonicalType::Date, v) => to_date(&v).map(SqlValue::Date),

            (CanonicalType::Numeric, SqlValue::Decimal(d)) => Some(SqlValue::Decimal(d)),
            (CanonicalType::Numeric, SqlValue::I64(i)) => Some(SqlValue::Decimal(Decimal::from(i))),
            (CanonicalType::Numeric, SqlValue::Bool(b)) => {
                Some(SqlValue::Decimal(Decimal::from(i64::from(b))))
            }
            (CanonicalType::Numeric, SqlValue::F64(f)) => {
                parse_decimal(&f.to_string()).map(SqlValue::Decimal)
            }
            (CanonicalType::Numeric, SqlValue::Text(s)) => parse_decimal(&s).map(SqlValue::Decimal),

            (CanonicalType::Boolean, SqlValue::Bool(b)) => Some(SqlValue::Bool(b)),
            (CanonicalType::Boolean, SqlValue::I64(i)) => Some(SqlValue::Bool(i != 0)),
            (CanonicalType::Boolean, SqlValue::F64(f)) => Some(SqlValue::Bool(f != 0.0)),
            (CanonicalType::Boolean, SqlValue::Decimal(d)) => Some(SqlValue::Bool(!d.is_zero())),
            (CanonicalType::Boolean, SqlValue::Text(s)) => parse_bool(&s).map(SqlValue::Bool),

            (CanonicalType::Text, SqlValue::Text(s)) => Some(SqlValue::Text(s)),
            (CanonicalType::Text, SqlValue::Bytes(b)) => String::from_utf8(b.into_owned())
                .ok()
                .map(|s| SqlValue::Text(Cow::Owned(s))),
            (CanonicalType::Text, v) => Some(SqlValue::Text(Cow::Owned(v.to_display()))),

            (CanonicalType::Integer, SqlValue::I64(i)) => Some(SqlValue::I64(i)),
            (CanonicalType::Integer, SqlValue::Bool(b)) => Some(SqlValue::I64(i64::from(b))),
            (CanonicalType::Integer, SqlValue::F64(f))
                if f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&f) =>
            {
                Some(SqlValue::I64(f as i64))
            }
            (CanonicalType::Integer, SqlValue::Decimal(d)) if d.fract().is_zero() => {
                d.trunc().to_string().parse().ok().map(SqlValue::I64)
            }
            (CanonicalType::Integer, SqlValue::Text(s)) => s.trim().parse().ok().map(SqlValue::I64),

            (CanonicalType::Float, SqlValue::F64(f)) => Some(SqlValue::F64(f)),
            (CanonicalType::Float, SqlValue::I64(i)) => Some(SqlValue::F64(i as f64)),
            (CanonicalType::Float, SqlValue::Decimal(d)) => {
                d.to_string().parse().ok().map(SqlValue::F64)
            }
            (CanonicalType::Float, SqlValue::Text(s)) => s.trim().parse().ok().map(SqlValue::F64),

            (CanonicalType::Binary, SqlValue::Bytes(b)) => Some(SqlValue::Bytes(b)),
            (CanonicalType::Binary, SqlValue::Text(s)) => {
                Some(SqlValue::Bytes(Cow::Owned(s.into_owned().into_bytes())))
            }

            (other, v) => {
                return Err(WardError::Storage(format!(
                    "cannot coerce {:?} to {}",
                    v, other
                )))
            }
        };

        coerced.ok_or_else(|| {
            WardError::Storage(format!("cannot coerce {:?} value to {}", source_kind, self))
        })
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Timestamp => write!(f, "timestamp"),
            CanonicalType::Date => write!(f, "date"),
            CanonicalType::Numeric => write!(f, "numeric"),
            CanonicalType::Boolean => write!(f, "boolean"),
            CanonicalType::Text => write!(f, "text"),
            CanonicalType::Integer => write!(f, "integer"),
            CanonicalType::Float => write!(f, "float"),
            CanonicalType::Binary => write!(f, "binary"),
            CanonicalType::Unmapped(name) => write!(f, "{}", name),
        }
    }
}

/// Whole floats in `I64_LOWER..I64_UPPER` convert to `i64` exactly; `f as i64`
/// would saturate anything outside.
const I64_LOWER: f64 = i64::MIN as f64;
const I64_UPPER: f64 = -(i64::MIN as f64);

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Parse an ISO-8601 style timestamp into a naive UTC timestamp.
///
/// Values carrying an offset (or `Z`) are converted to UTC; naive values
/// are taken as UTC already. A bare date parses as midnight.
pub fn parse_timestamp_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Interpret a stored value as a UTC timestamp.
///
/// Accepts native timestamps, dates, ISO text and epoch seconds.
pub fn to_timestamp(value: &SqlValue<'_>) -> Option<NaiveDateTime> {
    match value {
        SqlValue::DateTime(dt) => Some(*dt),
        SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
        SqlValue::Text(s) => parse_timestamp_text(s),
        SqlValue::I64(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        SqlValue::F64(secs) => {
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            DateTime::from_timestamp(whole, nanos).map(|dt| dt.naive_utc())
        }
        _ => None,
    }
}

fn to_date(value: &SqlValue<'_>) -> Option<NaiveDate> {
    match value {
        SqlValue::Date(d) => Some(*d),
        SqlValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_timestamp_text(s).map(|dt| dt.date())),
        other => to_timestamp(other).map(|dt| dt.date()),
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" => Some(true),
        "0" | "f" | "false" | "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_integer_from_float_rejects_out_of_range() {
        assert_eq!(
            CanonicalType::Integer.coerce(SqlValue::F64(4.0)).unwrap(),
            SqlValue::I64(4)
        );
        assert_eq!(
            CanonicalType::Integer
                .coerce(SqlValue::F64(i64::MIN as f64))
                .unwrap(),
            SqlValue::I64(i64::MIN)
        );
        for bad in [1e20, -1e20, 9.223372036854775807e18, f64::INFINITY, f64::NAN, 2.5] {
            let err = CanonicalType::Integer.coerce(SqlValue::F64(bad)).unwrap_err();
            assert!(matches!(err, WardError::Storage(_)), "{bad}");
        }
    }

    #[test]
    fn test_failed_coercion_names_source_kind() {
        let err = CanonicalType::Boolean
            .coerce(SqlValue::text_owned("maybe"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Storage error: cannot coerce String value to boolean"
        );
    }

    #[test]
    fn test_boolean_from_integer() {
        assert_eq!(
            CanonicalType::Boolean.coerce(SqlValue::I64(1)).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            CanonicalType::Boolean.coerce(SqlValue::I64(0)).unwrap(),
            SqlValue::Bool(false)
        );
        assert_eq!(
            CanonicalType::Boolean
                .coerce(SqlValue::text_owned("false"))
                .unwrap(),
            SqlValue::Bool(false)
        );
        assert!(CanonicalType::Boolean
            .coerce(SqlValue::text_owned("maybe"))
            .is_err());
    }

    #[test]
    fn test_timestamp_from_text_formats() {
        let expected = ts(2025, 1, 10, 8, 30);
        for input in [
            "2025-01-10 08:30:00",
            "2025-01-10T08:30:00",
            "2025-01-10 08:30:00.000000",
            "2025-01-10T08:30:00Z",
            "2025-01-10T10:30:00+02:00",
        ] {
            assert_eq!(
                CanonicalType::Timestamp
                    .coerce(SqlValue::text_owned(input))
                    .unwrap(),
                SqlValue::DateTime(expected),
                "input {input}"
            );
        }
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        let err = CanonicalType::Timestamp
            .coerce(SqlValue::text_owned("yesterday"))
            .unwrap_err();
        assert!(matches!(err, WardError::Storage(_)));
    }

    #[test]
    fn test_null_keeps_canonical_hint() {
        assert_eq!(
            CanonicalType::Timestamp
                .coerce(SqlValue::Null(SqlNullType::String))
                .unwrap(),
            SqlValue::Null(SqlNullType::DateTime)
        );
    }

    #[test]
    fn test_numeric_and_float_coercion() {
        assert_eq!(
            CanonicalType::Numeric
                .coerce(SqlValue::text_owned("36.6"))
                .unwrap(),
            SqlValue::Decimal(Decimal::from_str("36.6").unwrap())
        );
        assert_eq!(
            CanonicalType::Numeric.coerce(SqlValue::F64(1.5)).unwrap(),
            SqlValue::Decimal(Decimal::from_str("1.5").unwrap())
        );
        assert_eq!(
            CanonicalType::Float.coerce(SqlValue::I64(120)).unwrap(),
            SqlValue::F64(120.0)
        );
    }

    #[test]
    fn test_text_from_numbers() {
        assert_eq!(
            CanonicalType::Text.coerce(SqlValue::I64(42)).unwrap(),
            SqlValue::text_owned("42")
        );
    }

    #[test]
    fn test_unmapped_passes_through() {
        let v = SqlValue::from(vec![1u8, 2, 3]);
        assert_eq!(
            CanonicalType::Unmapped("GEOMETRY".into())
                .coerce(v.clone())
                .unwrap(),
            v
        );
    }

    #[test]
    fn test_date_from_timestamp_text() {
        assert_eq!(
            CanonicalType::Date
                .coerce(SqlValue::text_owned("1990-05-17 00:00:00"))
                .unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(1990, 5, 17).unwrap())
        );
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(to_timestamp(&SqlValue::I64(0)), Some(ts(1970, 1, 1, 0, 0)));
    }
}
