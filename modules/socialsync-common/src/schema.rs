//! Fixed column schemas for warehouse tables.
//!
//! Row types describe themselves as a static column list plus a positional
//! value vector, so a loader can create and fill a table without knowing
//! the concrete type.

use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Date,
    Timestamp,
    Text,
    Integer,
    Float,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMPTZ",
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self { name, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// A warehouse row with a fixed schema. `values()` must line up with `SCHEMA`.
pub trait Row: Send + Sync {
    const SCHEMA: &'static [Column];

    fn values(&self) -> Vec<Value>;
}
