//! Expression evaluation with SQL three-valued logic.

use crate::{ArithOp, BoolOp, CompareOp, Environment, Expr, MatchOp, functions};
use common::{DbError, DbResult};
use std::cmp::Ordering;
use types::{Value, coerce};

impl Expr {
    /// Evaluate this expression against an environment.
    ///
    /// UNKNOWN results are returned as `Value::Null`; type mismatches are
    /// `Type` errors, unresolved columns are `Schema` errors.
    pub fn evaluate(&self, env: &Environment<'_>) -> DbResult<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::ColumnRef(name) => Ok(env.lookup(name)?.clone()),
            Expr::Arith { op, left, right } => {
                let l = left.evaluate(env)?;
                let r = right.evaluate(env)?;
                let op = match op {
                    ArithOp::Add => coerce::NumericOp::Add,
                    ArithOp::Sub => coerce::NumericOp::Sub,
                    ArithOp::Mul => coerce::NumericOp::Mul,
                    ArithOp::Div => coerce::NumericOp::Div,
                    ArithOp::Mod => coerce::NumericOp::Rem,
                };
                coerce::arithmetic(op, &l, &r).map_err(|e| DbError::Type(e.to_string()))
            }
            Expr::Compare { op, left, right } => {
                let l = left.evaluate(env)?;
                let r = right.evaluate(env)?;
                let ord = coerce::compare(&l, &r).map_err(|e| DbError::Type(e.to_string()))?;
                Ok(match ord {
                    None => Value::Null,
                    Some(ord) => Value::Bool(compare_holds(*op, ord)),
                })
            }
            Expr::Boolean { op, terms } => eval_boolean(*op, terms, env),
            Expr::Not(e) => match e.evaluate(env)? {
                Value::Null => Ok(Value::Null),
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(DbError::Type(format!(
                    "NOT expects a boolean operand, got {other:?}"
                ))),
            },
            Expr::StringMatch {
                op,
                expr,
                pattern,
                negated,
            } => eval_string_match(*op, expr, pattern, *negated, env),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let needle = expr.evaluate(env)?;
                if needle.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_unknown = false;
                for candidate in list {
                    let v = candidate.evaluate(env)?;
                    match coerce::compare(&needle, &v)
                        .map_err(|e| DbError::Type(e.to_string()))?
                    {
                        None => saw_unknown = true,
                        Some(Ordering::Equal) => {
                            return Ok(Value::Bool(!negated));
                        }
                        Some(_) => {}
                    }
                }
                Ok(if saw_unknown {
                    Value::Null
                } else {
                    Value::Bool(*negated)
                })
            }
            Expr::IsNull { expr, negated } => {
                let v = expr.evaluate(env)?;
                Ok(Value::Bool(v.is_null() != *negated))
            }
            Expr::Exists(_) | Expr::InSelect { .. } | Expr::ScalarSubquery(_) => {
                Err(DbError::Plan(
                    "subquery must be materialised before evaluation".into(),
                ))
            }
            Expr::FunctionCall { name, args } => {
                let func = functions::registry()
                    .get(name)
                    .ok_or_else(|| DbError::Schema(format!("unknown function '{name}'")))?;
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(a.evaluate(env)?);
                }
                (func.eval)(&values)
            }
        }
    }

    /// Evaluate as a WHERE/ON predicate: UNKNOWN drops the row.
    pub fn evaluate_predicate(&self, env: &Environment<'_>) -> DbResult<bool> {
        match self.evaluate(env)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(DbError::Type(format!(
                "predicate must evaluate to boolean, got {other:?}"
            ))),
        }
    }
}

fn compare_holds(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    }
}

/// AND: FALSE dominates, then UNKNOWN, then TRUE. OR is the dual.
fn eval_boolean(op: BoolOp, terms: &[Expr], env: &Environment<'_>) -> DbResult<Value> {
    let mut saw_unknown = false;
    for term in terms {
        match term.evaluate(env)? {
            Value::Null => saw_unknown = true,
            Value::Bool(b) => match op {
                BoolOp::And if !b => return Ok(Value::Bool(false)),
                BoolOp::Or if b => return Ok(Value::Bool(true)),
                _ => {}
            },
            other => {
                return Err(DbError::Type(format!(
                    "AND/OR expects boolean operands, got {other:?}"
                )));
            }
        }
    }
    Ok(if saw_unknown {
        Value::Null
    } else {
        Value::Bool(matches!(op, BoolOp::And))
    })
}

fn eval_string_match(
    op: MatchOp,
    expr: &Expr,
    pattern: &Expr,
    negated: bool,
    env: &Environment<'_>,
) -> DbResult<Value> {
    let subject = expr.evaluate(env)?;
    let pattern = pattern.evaluate(env)?;
    if subject.is_null() || pattern.is_null() {
        return Ok(Value::Null);
    }
    let (Value::Text(subject), Value::Text(pattern)) = (&subject, &pattern) else {
        return Err(DbError::Type(
            "LIKE/SIMILAR TO expects string operands".into(),
        ));
    };

    let regex_src = match op {
        MatchOp::Like => like_to_regex(pattern),
        MatchOp::SimilarTo => format!("^(?:{pattern})$"),
    };
    let re = regex::Regex::new(&regex_src)
        .map_err(|e| DbError::Type(format!("invalid pattern '{pattern}': {e}")))?;

    Ok(Value::Bool(re.is_match(subject) != negated))
}

/// Translate a SQL LIKE pattern into an anchored regex: `%` matches any
/// sequence, `_` any single character, everything else literally.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
