//! Materialisation of uncorrelated subquery expressions.
//!
//! Before a SELECT is planned, every `EXISTS`, `IN (SELECT ...)` and scalar
//! subquery in its expressions is executed once through the supplied runner
//! and replaced with literal values, so the expression engine never sees a
//! subquery at evaluation time. A correlated reference simply fails to plan
//! inside the runner with an unknown-column schema error.

use common::{DbError, DbResult, Schema, Tuple};
use expr::{Expr, FromClause, JoinCondition, SelectClause, SelectValue};
use types::Value;

type Runner<'a> = dyn FnMut(&SelectClause) -> DbResult<(Schema, Vec<Tuple>)> + 'a;

/// Rewrite every subquery expression inside `select`.
pub(crate) fn materialize_select(
    select: &mut SelectClause,
    run: &mut Runner<'_>,
) -> DbResult<()> {
    for value in &mut select.values {
        if let SelectValue::Expression { expr, .. } = value {
            materialize_expr(expr, run)?;
        }
    }
    if let Some(from) = &mut select.from {
        materialize_from(from, run)?;
    }
    if let Some(pred) = &mut select.where_clause {
        materialize_expr(pred, run)?;
    }
    for e in &mut select.group_by {
        materialize_expr(e, run)?;
    }
    if let Some(having) = &mut select.having {
        materialize_expr(having, run)?;
    }
    for order in &mut select.order_by {
        materialize_expr(&mut order.expr, run)?;
    }
    Ok(())
}

fn materialize_from(from: &mut FromClause, run: &mut Runner<'_>) -> DbResult<()> {
    match from {
        FromClause::BaseTable { .. } => Ok(()),
        // Derived tables are planned recursively, not materialised; only
        // the subqueries inside their own expressions need rewriting.
        FromClause::Derived { query, .. } => materialize_select(query, run),
        FromClause::Join {
            left,
            right,
            condition,
            ..
        } => {
            materialize_from(left, run)?;
            materialize_from(right, run)?;
            if let JoinCondition::On(pred) = condition {
                materialize_expr(pred, run)?;
            }
            Ok(())
        }
    }
}

fn materialize_expr(expr: &mut Expr, run: &mut Runner<'_>) -> DbResult<()> {
    match expr {
        Expr::Exists(query) => {
            let (_, rows) = run(query)?;
            *expr = Expr::Literal(Value::Bool(!rows.is_empty()));
            Ok(())
        }
        Expr::InSelect {
            expr: needle,
            query,
            negated,
        } => {
            materialize_expr(needle, run)?;
            let (schema, rows) = run(query)?;
            if schema.column_count() != 1 {
                return Err(DbError::Type(format!(
                    "IN subquery must produce exactly one column, got {}",
                    schema.column_count()
                )));
            }
            let list = rows
                .into_iter()
                .map(|mut t| Expr::Literal(t.values.remove(0)))
                .collect();
            *expr = Expr::InList {
                expr: needle.clone(),
                list,
                negated: *negated,
            };
            Ok(())
        }
        Expr::ScalarSubquery(query) => {
            let (schema, mut rows) = run(query)?;
            if schema.column_count() != 1 {
                return Err(DbError::Type(format!(
                    "scalar subquery must produce exactly one column, got {}",
                    schema.column_count()
                )));
            }
            let value = match rows.len() {
                0 => Value::Null,
                1 => rows.remove(0).values.remove(0),
                n => {
                    return Err(DbError::Type(format!(
                        "scalar subquery returned {n} rows"
                    )));
                }
            };
            *expr = Expr::Literal(value);
            Ok(())
        }
        Expr::Literal(_) | Expr::ColumnRef(_) => Ok(()),
        Expr::Arith { left, right, .. } | Expr::Compare { left, right, .. } => {
            materialize_expr(left, run)?;
            materialize_expr(right, run)
        }
        Expr::Boolean { terms, .. } => {
            for t in terms {
                materialize_expr(t, run)?;
            }
            Ok(())
        }
        Expr::Not(e) | Expr::IsNull { expr: e, .. } => materialize_expr(e, run),
        Expr::StringMatch { expr, pattern, .. } => {
            materialize_expr(expr, run)?;
            materialize_expr(pattern, run)
        }
        Expr::InList { expr, list, .. } => {
            materialize_expr(expr, run)?;
            for e in list {
                materialize_expr(e, run)?;
            }
            Ok(())
        }
        Expr::FunctionCall { args, .. } => {
            for a in args {
                materialize_expr(a, run)?;
            }
            Ok(())
        }
    }
}
