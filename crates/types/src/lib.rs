pub mod coerce;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use std::fmt;

/// Recognised SQL column types.
///
/// `Numeric` carries its declared precision/scale; at runtime numeric values
/// are stored in double precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Numeric { precision: u8, scale: u8 },
    Char(u16),
    Varchar(u16),
    Text,
    Date,
    Time,
    DateTime,
    Timestamp,
    Bool,
    /// Internal type for record pointers; never user-declared.
    FilePointer,
}

impl SqlType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                SqlType::Float | SqlType::Double | SqlType::Numeric { .. }
            )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, SqlType::Char(_) | SqlType::Varchar(_) | SqlType::Text)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::DateTime | SqlType::Timestamp
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::TinyInt => write!(f, "TINYINT"),
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::Int => write!(f, "INTEGER"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Float => write!(f, "FLOAT"),
            SqlType::Double => write!(f, "DOUBLE"),
            SqlType::Numeric { precision, scale } => write!(f, "NUMERIC({precision},{scale})"),
            SqlType::Char(n) => write!(f, "CHAR({n})"),
            SqlType::Varchar(n) => write!(f, "VARCHAR({n})"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Date => write!(f, "DATE"),
            SqlType::Time => write!(f, "TIME"),
            SqlType::DateTime => write!(f, "DATETIME"),
            SqlType::Timestamp => write!(f, "TIMESTAMP"),
            SqlType::Bool => write!(f, "BOOLEAN"),
            SqlType::FilePointer => write!(f, "FILE_POINTER"),
        }
    }
}

/// A nullable tagged SQL scalar. `Null` is a distinct value, not "absent".
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(NaiveDateTime),
    FilePointer { page: u32, offset: u16 },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Strict boolean extraction: only `Bool` values qualify.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The runtime type of this value; `None` for SQL NULL, which is typeless.
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            Value::Null => None,
            Value::TinyInt(_) => Some(SqlType::TinyInt),
            Value::SmallInt(_) => Some(SqlType::SmallInt),
            Value::Int(_) => Some(SqlType::Int),
            Value::BigInt(_) => Some(SqlType::BigInt),
            Value::Float(_) => Some(SqlType::Float),
            Value::Double(_) => Some(SqlType::Double),
            Value::Text(_) => Some(SqlType::Text),
            Value::Bool(_) => Some(SqlType::Bool),
            Value::Date(_) => Some(SqlType::Date),
            Value::Time(_) => Some(SqlType::Time),
            Value::DateTime(_) => Some(SqlType::DateTime),
            Value::Timestamp(_) => Some(SqlType::Timestamp),
            Value::FilePointer { .. } => Some(SqlType::FilePointer),
        }
    }

    /// SQL comparison with three-valued semantics.
    ///
    /// Returns `Ok(None)` (UNKNOWN) when either operand is NULL, and a
    /// coercion error when the operand types cannot be compared at all.
    pub fn sql_cmp(&self, other: &Value) -> Result<Option<Ordering>, coerce::CoerceError> {
        coerce::compare(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::FilePointer { page, offset } => write!(f, "@{page}:{offset}"),
        }
    }
}
