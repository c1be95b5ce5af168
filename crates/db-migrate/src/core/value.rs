//! SQL value types for database-agnostic row transfer.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

/// One cell read from a source or handed to a target.
///
/// Drivers convert their native row representation into this enum at the
/// read boundary, so large objects arrive here already materialized as
/// [`SqlValue::Bytes`] or [`SqlValue::Text`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    /// Structured (nested object or array) value.
    Json(serde_json::Value),
    /// Timestamp without time zone.
    DateTime(NaiveDateTime),
    /// Timestamp with offset.
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view of the value, if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I16(v) => Some(*v as i64),
            SqlValue::I32(v) => Some(*v as i64),
            SqlValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value. Text is parsed when it looks like a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::I16(v) => Some(*v as f64),
            SqlValue::I32(v) => Some(*v as f64),
            SqlValue::I64(v) => Some(*v as f64),
            SqlValue::F32(v) => Some(*v as f64),
            SqlValue::F64(v) => Some(*v),
            SqlValue::Decimal(d) => d.to_f64(),
            SqlValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SqlValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// True for date and timestamp variants.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlValue::DateTime(_) | SqlValue::DateTimeOffset(_) | SqlValue::Date(_)
        )
    }

    /// Text rendering used in reports, stats and dead-letter files.
    ///
    /// Timestamps use ISO-8601 with a `T` separator. Bytes are lower-case hex.
    /// NULL renders as `None`.
    pub fn to_text(&self) -> Option<String> {
        let s = match self {
            SqlValue::Null => return None,
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Bytes(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
            SqlValue::Uuid(u) => u.to_string(),
            SqlValue::Json(v) => v.to_string(),
            SqlValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            SqlValue::DateTimeOffset(dt) => dt.to_rfc3339(),
            SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            SqlValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        };
        Some(s)
    }

    /// JSON rendering for validation reports.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Bool(b) => serde_json::Value::from(*b),
            SqlValue::I16(v) => serde_json::Value::from(*v),
            SqlValue::I32(v) => serde_json::Value::from(*v),
            SqlValue::I64(v) => serde_json::Value::from(*v),
            SqlValue::F32(v) => serde_json::Value::from(*v as f64),
            SqlValue::F64(v) => serde_json::Value::from(*v),
            SqlValue::Json(v) => v.clone(),
            other => other
                .to_text()
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One page of rows read from a source table.
///
/// `columns` names the position of each value in every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl Page {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}
