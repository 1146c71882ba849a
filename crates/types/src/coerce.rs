//! Implicit coercion for comparison and arithmetic.
//!
//! The rules are deliberately narrow: the integer family widens to the
//! largest operand, any float operand promotes the pair to double precision,
//! and everything else must match exactly. A NULL operand short-circuits to
//! the SQL UNKNOWN/NULL result before any coercion is attempted.

use crate::{SqlType, Value};
use std::cmp::Ordering;
use std::fmt;

/// Raised when two operand types cannot be reconciled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoerceError(pub String);

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CoerceError {}

/// Arithmetic operators understood by the coercion layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for NumericOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NumericOp::Add => "+",
            NumericOp::Sub => "-",
            NumericOp::Mul => "*",
            NumericOp::Div => "/",
            NumericOp::Rem => "%",
        };
        write!(f, "{s}")
    }
}

enum Widened {
    Int(i64, i64),
    Double(f64, f64),
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::TinyInt(x) => Some(i64::from(*x)),
        Value::SmallInt(x) => Some(i64::from(*x)),
        Value::Int(x) => Some(i64::from(*x)),
        Value::BigInt(x) => Some(*x),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Float(x) => Some(f64::from(*x)),
        Value::Double(x) => Some(*x),
        _ => as_i64(v).map(|x| x as f64),
    }
}

fn is_float(v: &Value) -> bool {
    matches!(v, Value::Float(_) | Value::Double(_))
}

fn widen_numeric(l: &Value, r: &Value) -> Option<Widened> {
    if is_float(l) || is_float(r) {
        Some(Widened::Double(as_f64(l)?, as_f64(r)?))
    } else {
        Some(Widened::Int(as_i64(l)?, as_i64(r)?))
    }
}

fn incompatible(what: &str, l: &Value, r: &Value) -> CoerceError {
    let lt = l.sql_type().map(|t| t.to_string()).unwrap_or_default();
    let rt = r.sql_type().map(|t| t.to_string()).unwrap_or_default();
    CoerceError(format!("cannot {what} {lt} and {rt}"))
}

/// SQL comparison. `Ok(None)` is UNKNOWN (a NULL operand).
pub fn compare(l: &Value, r: &Value) -> Result<Option<Ordering>, CoerceError> {
    if l.is_null() || r.is_null() {
        return Ok(None);
    }

    let ord = match (l, r) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Time(a), Value::Time(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b))
        | (Value::Timestamp(a), Value::Timestamp(b))
        | (Value::DateTime(a), Value::Timestamp(b))
        | (Value::Timestamp(a), Value::DateTime(b)) => a.cmp(b),
        (
            Value::FilePointer { page: p1, offset: o1 },
            Value::FilePointer { page: p2, offset: o2 },
        ) => (p1, o1).cmp(&(p2, o2)),
        _ => match widen_numeric(l, r) {
            Some(Widened::Int(a, b)) => a.cmp(&b),
            Some(Widened::Double(a, b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| CoerceError("NaN is not comparable".into()))?,
            None => return Err(incompatible("compare", l, r)),
        },
    };

    Ok(Some(ord))
}

/// The wider of two integer-family types, used to pick the result type of
/// integer arithmetic.
fn wider_int_type(l: &Value, r: &Value) -> SqlType {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::TinyInt(_) => 0,
            Value::SmallInt(_) => 1,
            Value::Int(_) => 2,
            _ => 3,
        }
    }
    match rank(l).max(rank(r)) {
        0 => SqlType::TinyInt,
        1 => SqlType::SmallInt,
        2 => SqlType::Int,
        _ => SqlType::BigInt,
    }
}

fn narrow_int(result: i64, ty: SqlType) -> Value {
    match ty {
        SqlType::TinyInt => i8::try_from(result)
            .map(Value::TinyInt)
            .unwrap_or(Value::BigInt(result)),
        SqlType::SmallInt => i16::try_from(result)
            .map(Value::SmallInt)
            .unwrap_or(Value::BigInt(result)),
        SqlType::Int => i32::try_from(result)
            .map(Value::Int)
            .unwrap_or(Value::BigInt(result)),
        _ => Value::BigInt(result),
    }
}

/// Arithmetic over numeric values. A NULL operand yields NULL; division or
/// remainder by zero is an error.
pub fn arithmetic(op: NumericOp, l: &Value, r: &Value) -> Result<Value, CoerceError> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    match widen_numeric(l, r) {
        Some(Widened::Int(a, b)) => {
            let out = match op {
                NumericOp::Add => a.checked_add(b),
                NumericOp::Sub => a.checked_sub(b),
                NumericOp::Mul => a.checked_mul(b),
                NumericOp::Div => {
                    if b == 0 {
                        return Err(CoerceError("division by zero".into()));
                    }
                    a.checked_div(b)
                }
                NumericOp::Rem => {
                    if b == 0 {
                        return Err(CoerceError("division by zero".into()));
                    }
                    a.checked_rem(b)
                }
            }
            .ok_or_else(|| CoerceError(format!("integer overflow in {a} {op} {b}")))?;
            Ok(narrow_int(out, wider_int_type(l, r)))
        }
        Some(Widened::Double(a, b)) => {
            if matches!(op, NumericOp::Div | NumericOp::Rem) && b == 0.0 {
                return Err(CoerceError("division by zero".into()));
            }
            let out = match op {
                NumericOp::Add => a + b,
                NumericOp::Sub => a - b,
                NumericOp::Mul => a * b,
                NumericOp::Div => a / b,
                NumericOp::Rem => a % b,
            };
            Ok(Value::Double(out))
        }
        None => Err(incompatible("apply arithmetic to", l, r)),
    }
}

/// The result type of an arithmetic expression over two operand types,
/// mirroring the widening rules above.
pub fn arithmetic_result_type(l: SqlType, r: SqlType) -> Result<SqlType, CoerceError> {
    if !l.is_numeric() || !r.is_numeric() {
        return Err(CoerceError(format!("cannot apply arithmetic to {l} and {r}")));
    }
    if matches!(l, SqlType::Float | SqlType::Double | SqlType::Numeric { .. })
        || matches!(r, SqlType::Float | SqlType::Double | SqlType::Numeric { .. })
    {
        return Ok(SqlType::Double);
    }
    fn rank(t: SqlType) -> u8 {
        match t {
            SqlType::TinyInt => 0,
            SqlType::SmallInt => 1,
            SqlType::Int => 2,
            _ => 3,
        }
    }
    Ok(if rank(l) >= rank(r) { l } else { r })
}
