use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::schema::ColumnKind;

/// Typed cell value produced by the synthesis engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(String),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(value) | CellValue::Uuid(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Whether this value is acceptable for a column of the given kind.
    ///
    /// `Null` conformance is decided by the caller (nullability and deferred
    /// foreign keys), not here.
    pub fn conforms_to(&self, kind: ColumnKind) -> bool {
        match (self, kind) {
            (CellValue::Null, _) => true,
            (CellValue::Int(_), ColumnKind::Integer) => true,
            (CellValue::Int(_) | CellValue::Float(_), ColumnKind::Decimal) => true,
            (CellValue::Bool(_), ColumnKind::Boolean) => true,
            (CellValue::Text(_), ColumnKind::Text) => true,
            (CellValue::Uuid(_), ColumnKind::Uuid) => true,
            (CellValue::Timestamp(_), ColumnKind::Timestamp) => true,
            _ => false,
        }
    }

    /// Convert a parent key value to the declared kind of a foreign-key
    /// column during backfill.
    ///
    /// Mirrors the cast ladder of the repair pass: integer cast, decimal
    /// cast, boolean-as-0/1, string cast. Returns `None` when no sensible
    /// cast exists; the caller counts that as a backfill failure.
    pub fn coerce_to(&self, kind: ColumnKind) -> Option<CellValue> {
        match kind {
            ColumnKind::Integer => match self {
                CellValue::Int(value) => Some(CellValue::Int(*value)),
                CellValue::Float(value) => Some(CellValue::Int(*value as i64)),
                CellValue::Bool(value) => Some(CellValue::Int(i64::from(*value))),
                CellValue::Text(value) => value.parse::<i64>().ok().map(CellValue::Int),
                _ => None,
            },
            ColumnKind::Decimal => match self {
                CellValue::Int(value) => Some(CellValue::Float(*value as f64)),
                CellValue::Float(value) => Some(CellValue::Float(*value)),
                CellValue::Text(value) => value.parse::<f64>().ok().map(CellValue::Float),
                _ => None,
            },
            ColumnKind::Boolean => match self {
                CellValue::Bool(value) => Some(CellValue::Bool(*value)),
                CellValue::Int(value) => Some(CellValue::Bool(*value != 0)),
                _ => None,
            },
            ColumnKind::Uuid => match self {
                CellValue::Uuid(value) | CellValue::Text(value) => {
                    Some(CellValue::Uuid(value.clone()))
                }
                _ => None,
            },
            ColumnKind::Text => Some(CellValue::Text(self.render())),
            ColumnKind::Timestamp => match self {
                CellValue::Timestamp(value) => Some(CellValue::Timestamp(*value)),
                _ => None,
            },
        }
    }

    /// Plain-text rendering used for string casts and log output.
    pub fn render(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(value) => value.to_string(),
            CellValue::Int(value) => value.to_string(),
            CellValue::Float(value) => format!("{value:.2}"),
            CellValue::Text(value) | CellValue::Uuid(value) => value.clone(),
            CellValue::Timestamp(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}
