//! Process-wide scalar function registry.
//!
//! Names are stored upper-cased after trimming. The registry of built-ins is
//! initialised once behind a `Lazy`; lookups after that are plain map reads.

use common::{DbError, DbResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use types::{SqlType, Value};

/// Evaluation body of a scalar function.
pub type EvalFn = fn(&[Value]) -> DbResult<Value>;

/// Return-type inference from argument types.
pub type ReturnTypeFn = fn(&[SqlType]) -> DbResult<SqlType>;

pub struct SqlFunction {
    pub name: &'static str,
    pub eval: EvalFn,
    pub return_type: ReturnTypeFn,
}

#[derive(Default)]
pub struct FunctionRegistry {
    map: HashMap<String, SqlFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under its trimmed, upper-cased name. Registering
    /// the same name twice is an error.
    pub fn register(&mut self, func: SqlFunction) -> DbResult<()> {
        let key = func.name.trim().to_uppercase();
        if self.map.contains_key(&key) {
            return Err(DbError::Catalog(format!(
                "function '{key}' already registered"
            )));
        }
        self.map.insert(key, func);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SqlFunction> {
        self.map.get(&name.trim().to_uppercase())
    }
}

/// The global registry of built-in scalar functions.
pub fn registry() -> &'static FunctionRegistry {
    static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(|| {
        let mut reg = FunctionRegistry::new();
        for func in builtins() {
            reg.register(func).expect("built-in names are unique");
        }
        reg
    });
    &REGISTRY
}

fn arity(name: &str, args: &[Value], expected: usize) -> DbResult<()> {
    if args.len() != expected {
        return Err(DbError::Type(format!(
            "{name} expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn numeric_f64(name: &str, v: &Value) -> DbResult<f64> {
    match v {
        Value::TinyInt(x) => Ok(f64::from(*x)),
        Value::SmallInt(x) => Ok(f64::from(*x)),
        Value::Int(x) => Ok(f64::from(*x)),
        Value::BigInt(x) => Ok(*x as f64),
        Value::Float(x) => Ok(f64::from(*x)),
        Value::Double(x) => Ok(*x),
        other => Err(DbError::Type(format!(
            "{name} expects a numeric argument, got {other:?}"
        ))),
    }
}

fn text_arg<'a>(name: &str, v: &'a Value) -> DbResult<&'a str> {
    match v {
        Value::Text(s) => Ok(s),
        other => Err(DbError::Type(format!(
            "{name} expects a string argument, got {other:?}"
        ))),
    }
}

fn double_return(_args: &[SqlType]) -> DbResult<SqlType> {
    Ok(SqlType::Double)
}

fn builtins() -> Vec<SqlFunction> {
    vec![
        SqlFunction {
            name: "ABS",
            eval: |args| {
                arity("ABS", args, 1)?;
                Ok(match &args[0] {
                    Value::Null => Value::Null,
                    Value::TinyInt(v) => Value::TinyInt(v.wrapping_abs()),
                    Value::SmallInt(v) => Value::SmallInt(v.wrapping_abs()),
                    Value::Int(v) => Value::Int(v.wrapping_abs()),
                    Value::BigInt(v) => Value::BigInt(v.wrapping_abs()),
                    Value::Float(v) => Value::Float(v.abs()),
                    Value::Double(v) => Value::Double(v.abs()),
                    other => {
                        return Err(DbError::Type(format!(
                            "ABS expects a numeric argument, got {other:?}"
                        )));
                    }
                })
            },
            return_type: |args| {
                args.first().copied().ok_or_else(|| {
                    DbError::Type("ABS expects 1 argument(s), got 0".into())
                })
            },
        },
        SqlFunction {
            name: "CEIL",
            eval: |args| {
                arity("CEIL", args, 1)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Double(numeric_f64("CEIL", &args[0])?.ceil()))
            },
            return_type: double_return,
        },
        SqlFunction {
            name: "FLOOR",
            eval: |args| {
                arity("FLOOR", args, 1)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Double(numeric_f64("FLOOR", &args[0])?.floor()))
            },
            return_type: double_return,
        },
        SqlFunction {
            name: "SQRT",
            eval: |args| {
                arity("SQRT", args, 1)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                let v = numeric_f64("SQRT", &args[0])?;
                if v < 0.0 {
                    return Err(DbError::Type("SQRT of a negative value".into()));
                }
                Ok(Value::Double(v.sqrt()))
            },
            return_type: double_return,
        },
        SqlFunction {
            name: "POWER",
            eval: |args| {
                arity("POWER", args, 2)?;
                if args[0].is_null() || args[1].is_null() {
                    return Ok(Value::Null);
                }
                let base = numeric_f64("POWER", &args[0])?;
                let exp = numeric_f64("POWER", &args[1])?;
                Ok(Value::Double(base.powf(exp)))
            },
            return_type: double_return,
        },
        SqlFunction {
            name: "LENGTH",
            eval: |args| {
                arity("LENGTH", args, 1)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Int(text_arg("LENGTH", &args[0])?.chars().count() as i32))
            },
            return_type: |_| Ok(SqlType::Int),
        },
        SqlFunction {
            name: "LOWER",
            eval: |args| {
                arity("LOWER", args, 1)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Text(text_arg("LOWER", &args[0])?.to_lowercase()))
            },
            return_type: |_| Ok(SqlType::Text),
        },
        SqlFunction {
            name: "UPPER",
            eval: |args| {
                arity("UPPER", args, 1)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Text(text_arg("UPPER", &args[0])?.to_uppercase()))
            },
            return_type: |_| Ok(SqlType::Text),
        },
        SqlFunction {
            name: "TRIM",
            eval: |args| {
                arity("TRIM", args, 1)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Text(text_arg("TRIM", &args[0])?.trim().to_string()))
            },
            return_type: |_| Ok(SqlType::Text),
        },
        SqlFunction {
            name: "COALESCE",
            eval: |args| {
                if args.is_empty() {
                    return Err(DbError::Type(
                        "COALESCE expects at least one argument".into(),
                    ));
                }
                Ok(args
                    .iter()
                    .find(|v| !v.is_null())
                    .cloned()
                    .unwrap_or(Value::Null))
            },
            return_type: |args| {
                args.first().copied().ok_or_else(|| {
                    DbError::Type("COALESCE expects at least one argument".into())
                })
            },
        },
        SqlFunction {
            name: "NULLIF",
            eval: |args| {
                arity("NULLIF", args, 2)?;
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                match types::coerce::compare(&args[0], &args[1])
                    .map_err(|e| DbError::Type(e.to_string()))?
                {
                    Some(std::cmp::Ordering::Equal) => Ok(Value::Null),
                    _ => Ok(args[0].clone()),
                }
            },
            return_type: |args| {
                args.first().copied().ok_or_else(|| {
                    DbError::Type("NULLIF expects 2 argument(s), got 0".into())
                })
            },
        },
        SqlFunction {
            name: "IF",
            eval: |args| {
                arity("IF", args, 3)?;
                match &args[0] {
                    Value::Bool(true) => Ok(args[1].clone()),
                    Value::Bool(false) | Value::Null => Ok(args[2].clone()),
                    other => Err(DbError::Type(format!(
                        "IF expects a boolean condition, got {other:?}"
                    ))),
                }
            },
            return_type: |args| {
                args.get(1).copied().ok_or_else(|| {
                    DbError::Type("IF expects 3 argument(s), got fewer".into())
                })
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_trimmed() {
        assert!(registry().get("abs").is_some());
        assert!(registry().get("  Upper  ").is_some());
        assert!(registry().get("NO_SUCH_FN").is_none());
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut reg = FunctionRegistry::new();
        let f = || SqlFunction {
            name: "dup",
            eval: |_| Ok(Value::Null),
            return_type: |_| Ok(SqlType::Int),
        };
        reg.register(f()).unwrap();
        assert!(reg.register(f()).is_err());
    }

    #[test]
    fn null_propagates_through_scalar_functions() {
        let f = registry().get("LENGTH").unwrap();
        assert_eq!((f.eval)(&[Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn coalesce_returns_first_non_null() {
        let f = registry().get("COALESCE").unwrap();
        assert_eq!(
            (f.eval)(&[Value::Null, Value::Int(2), Value::Int(3)]).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn arity_mismatch_is_a_type_error() {
        let f = registry().get("POWER").unwrap();
        assert!((f.eval)(&[Value::Int(2)]).is_err());
    }
}
