//! Typed rows exchanged with an [`Executor`](crate::executor::Executor).
//!
//! Operands and result columns travel as [`SqlValue`]s. A [`Row`] is a fixed-arity list of them, and
//! [`DecodeRow`] turns one row into a domain value. Every queue operation decodes through the same two
//! steps: [`Row::take`] pulls a column out as a Rust type, failing with
//! [`Error::Decode`](crate::error::Error::Decode) when the column is missing or has the wrong type,
//! and the `DecodeRow` impl assembles the entity.
use crate::error::{Error, Result};
use crate::json::JsonValue;
use chrono::{DateTime, Utc};

/// A typed operand or column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(JsonValue),
    BigIntArray(Vec<i64>),
    JsonArray(Vec<JsonValue>),
}

impl SqlValue {
    /// SQL-ish name of the value's type, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "BOOLEAN",
            SqlValue::Int(_) => "INTEGER",
            SqlValue::BigInt(_) => "BIGINT",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Timestamp(_) => "TIMESTAMPTZ",
            SqlValue::Json(_) => "JSONB",
            SqlValue::BigIntArray(_) => "BIGINT[]",
            SqlValue::JsonArray(_) => "JSONB[]",
        }
    }
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v.into())
                }
            }
        )*
    };
}

sql_value_from! {
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    &str => Text,
    String => Text,
    DateTime<Utc> => Timestamp,
    JsonValue => Json,
    Vec<i64> => BigIntArray,
    Vec<JsonValue> => JsonArray,
}

/// Column types an executor must be able to produce.
///
/// Every column may also come back as [`SqlValue::Null`]; whether that is acceptable is decided by
/// the target type in [`Row::take`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    BigInt,
    Text,
    Timestamp,
    Json,
}

/// Conversion from a single column value.
pub trait FromSqlValue: Sized {
    /// Expected SQL type, used in decode errors.
    const EXPECTED: &'static str;

    /// `None` when `value` does not have the expected type.
    fn from_sql_value(value: SqlValue) -> Option<Self>;
}

impl FromSqlValue for i64 {
    const EXPECTED: &'static str = "BIGINT";

    fn from_sql_value(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::BigInt(v) => Some(v),
            SqlValue::Int(v) => Some(i64::from(v)),
            _ => None,
        }
    }
}

impl FromSqlValue for bool {
    const EXPECTED: &'static str = "BOOLEAN";

    fn from_sql_value(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl FromSqlValue for String {
    const EXPECTED: &'static str = "TEXT";

    fn from_sql_value(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    const EXPECTED: &'static str = "TIMESTAMPTZ";

    fn from_sql_value(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Timestamp(v) => Some(v),
            _ => None,
        }
    }
}

impl FromSqlValue for JsonValue {
    const EXPECTED: &'static str = "JSONB";

    fn from_sql_value(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_sql_value(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => Some(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Move the column at `index` out of the row as a `T`, leaving `Null` behind.
    ///
    /// # Errors
    /// [`Error::Decode`] if the row has no such column or the value is not a `T`.
    /// A NULL only decodes into `Option<T>`.
    pub fn take<T: FromSqlValue>(&mut self, index: usize) -> Result<T> {
        let len = self.values.len();
        let value = self
            .values
            .get_mut(index)
            .map(std::mem::take)
            .ok_or_else(|| Error::column(index, format!("row has only {} columns", len)))?;
        let found = value.kind();
        T::from_sql_value(value)
            .ok_or_else(|| Error::column(index, format!("expected {}, found {}", T::EXPECTED, found)))
    }
}

impl From<Vec<SqlValue>> for Row {
    fn from(values: Vec<SqlValue>) -> Self {
        Self::new(values)
    }
}

/// Decoding of one result row into a domain value.
pub trait DecodeRow: Sized {
    /// Column types, in order, that the row is expected to carry.
    const COLUMNS: &'static [ColumnType];

    fn decode_row(row: Row) -> Result<Self>;
}

/// Single `BIGINT` column: message ids and counts.
impl DecodeRow for i64 {
    const COLUMNS: &'static [ColumnType] = &[ColumnType::BigInt];

    fn decode_row(mut row: Row) -> Result<Self> {
        row.take(0)
    }
}

/// Single `BOOLEAN` column: success flags.
impl DecodeRow for bool {
    const COLUMNS: &'static [ColumnType] = &[ColumnType::Bool];

    fn decode_row(mut row: Row) -> Result<Self> {
        row.take(0)
    }
}
