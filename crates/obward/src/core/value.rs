//! SQL value types shared by the source reader, target sessions and ward ops.
//!
//! Values carry enough type information for the PostgreSQL session to pick a
//! parameter cast, including for NULLs.

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Type hint for NULL values so the target can bind a correctly typed NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I64,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    Date,
}

/// SQL value enum for row handling.
///
/// Uses `Cow` for string and byte data so readers can borrow while decoding;
/// anything stored in a [`Row`] or sent across a transaction is `'static`.
///
/// ```rust
/// use std::borrow::Cow;
/// use obward::core::SqlValue;
///
/// let borrowed: SqlValue<'_> = SqlValue::Text(Cow::Borrowed("B01"));
/// let owned: SqlValue<'static> = borrowed.into_owned();
/// assert_eq!(owned.as_str(), Some("B01"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// NULL with type hint for correct parameter binding.
    Null(SqlNullType),

    Bool(bool),

    /// All integer widths collapse to 64 bits.
    I64(i64),

    F64(f64),

    Text(Cow<'a, str>),

    Bytes(Cow<'a, [u8]>),

    Uuid(Uuid),

    Decimal(Decimal),

    /// Timestamp without timezone. Ward timestamps are stored as UTC.
    DateTime(NaiveDateTime),

    Date(NaiveDate),
}

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null(t) => SqlValue::Null(t),
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Uuid(v) => SqlValue::Uuid(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::Date(v) => SqlValue::Date(v),
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Get the SqlNullType for this value (for type-aware NULL binding).
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlNullType::Bool,
            SqlValue::I64(_) => SqlNullType::I64,
            SqlValue::F64(_) => SqlNullType::F64,
            SqlValue::Text(_) => SqlNullType::String,
            SqlValue::Bytes(_) => SqlNullType::Bytes,
            SqlValue::Uuid(_) => SqlNullType::Uuid,
            SqlValue::Decimal(_) => SqlNullType::Decimal,
            SqlValue::DateTime(_) => SqlNullType::DateTime,
            SqlValue::Date(_) => SqlNullType::Date,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::F64(v) => Some(*v),
            SqlValue::I64(v) => Some(*v as f64),
            SqlValue::Decimal(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }

    /// Render the value as plain text, the way a result table shows it.
    ///
    /// Floats are left to the caller so it can apply its own precision.
    pub fn to_display(&self) -> String {
        match self {
            SqlValue::Null(_) => String::new(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Text(s) => s.to_string(),
            SqlValue::Bytes(b) => format!("\\x{}", hex::encode(b)),
            SqlValue::Uuid(u) => u.to_string(),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

// Convenience constructors for common cases
impl<'a> SqlValue<'a> {
    /// Create a text value from an owned String.
    #[must_use]
    pub fn text_owned(s: impl Into<String>) -> SqlValue<'static> {
        SqlValue::Text(Cow::Owned(s.into()))
    }

    /// NULL text, the most common nullable argument in the ward ops.
    #[must_use]
    pub fn null_text() -> SqlValue<'static> {
        SqlValue::Null(SqlNullType::String)
    }
}

impl From<bool> for SqlValue<'static> {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue<'static> {
    fn from(v: i32) -> Self {
        SqlValue::I64(i64::from(v))
    }
}

impl From<i64> for SqlValue<'static> {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue<'static> {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

impl From<Vec<u8>> for SqlValue<'static> {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(Cow::Owned(v))
    }
}

impl From<Uuid> for SqlValue<'static> {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Decimal> for SqlValue<'static> {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue<'static> {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue<'static> {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl<T> From<Option<T>> for SqlValue<'static>
where
    T: Into<SqlValue<'static>> + NullHint,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null(T::NULL_TYPE),
        }
    }
}

/// Maps a Rust type to the NULL hint used when an `Option` of it is `None`.
pub trait NullHint {
    const NULL_TYPE: SqlNullType;
}

impl NullHint for String {
    const NULL_TYPE: SqlNullType = SqlNullType::String;
}

impl NullHint for i64 {
    const NULL_TYPE: SqlNullType = SqlNullType::I64;
}

impl NullHint for f64 {
    const NULL_TYPE: SqlNullType = SqlNullType::F64;
}

impl NullHint for Decimal {
    const NULL_TYPE: SqlNullType = SqlNullType::Decimal;
}

impl NullHint for NaiveDateTime {
    const NULL_TYPE: SqlNullType = SqlNullType::DateTime;
}

/// A result row: column names alongside owned values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<SqlValue<'static>>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue<'static>>) -> Self {
        Self { columns, values }
    }

    /// Look up a value by column name (case-insensitive).
    pub fn get(&self, column: &str) -> Option<&SqlValue<'static>> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    /// Text value of a column, `None` for NULL or a non-text value.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
