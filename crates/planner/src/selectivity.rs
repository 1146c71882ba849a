//! Predicate selectivity estimation.
//!
//! A pure function from `(predicate, schema, per-column stats)` to `[0, 1]`.
//! Comparisons against literals consult column min/max/distinct statistics;
//! AND multiplies term selectivities; OR uses inclusion–exclusion for two
//! terms and falls back to `1 − ∏(1−sᵢ)` for more. Anything opaque gets the
//! default selectivity.

use catalog::ColumnStats;
use common::Schema;
use expr::{BoolOp, CompareOp, Expr};
use types::Value;

/// Assumed selectivity for predicates the estimator cannot analyse.
pub const DEFAULT_SELECTIVITY: f32 = 0.25;

/// Estimate the fraction of tuples satisfying `predicate` against a schema
/// with per-column statistics (aligned with the schema's ordinals; an empty
/// slice disables statistics).
pub fn estimate_selectivity(predicate: &Expr, schema: &Schema, stats: &[ColumnStats]) -> f32 {
    let sel = match predicate {
        Expr::Literal(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Expr::Boolean {
            op: BoolOp::And,
            terms,
        } => terms
            .iter()
            .map(|t| estimate_selectivity(t, schema, stats))
            .product(),
        Expr::Boolean {
            op: BoolOp::Or,
            terms,
        } => match terms.as_slice() {
            [a, b] => {
                let sa = estimate_selectivity(a, schema, stats);
                let sb = estimate_selectivity(b, schema, stats);
                sa + sb - sa * sb
            }
            terms => {
                1.0 - terms
                    .iter()
                    .map(|t| 1.0 - estimate_selectivity(t, schema, stats))
                    .product::<f32>()
            }
        },
        Expr::Not(inner) => 1.0 - estimate_selectivity(inner, schema, stats),
        Expr::Compare { op, left, right } => estimate_compare(*op, left, right, schema, stats),
        _ => DEFAULT_SELECTIVITY,
    };
    sel.clamp(0.0, 1.0)
}

fn estimate_compare(
    op: CompareOp,
    left: &Expr,
    right: &Expr,
    schema: &Schema,
    stats: &[ColumnStats],
) -> f32 {
    // Normalise to column-op-literal; flip the operator when the literal is
    // on the left.
    let (column, op, literal) = match (left, right) {
        (Expr::ColumnRef(name), Expr::Literal(v)) => (name, op, v),
        (Expr::Literal(v), Expr::ColumnRef(name)) => (name, op.flipped(), v),
        _ => return DEFAULT_SELECTIVITY,
    };
    if literal.is_null() {
        // Comparison against NULL is UNKNOWN everywhere.
        return 0.0;
    }

    let Ok(Some(ordinal)) = schema.column_index(column) else {
        return DEFAULT_SELECTIVITY;
    };
    let Some(col_stats) = stats.get(ordinal) else {
        return DEFAULT_SELECTIVITY;
    };

    match op {
        CompareOp::Eq => match col_stats.num_distinct {
            0 => DEFAULT_SELECTIVITY,
            n => 1.0 / n as f32,
        },
        CompareOp::Ne => match col_stats.num_distinct {
            0 => 1.0 - DEFAULT_SELECTIVITY,
            n => 1.0 - 1.0 / n as f32,
        },
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            range_selectivity(op, literal, col_stats)
        }
    }
}

/// Uniform-distribution estimate over the column's [min, max] range.
fn range_selectivity(op: CompareOp, literal: &Value, stats: &ColumnStats) -> f32 {
    let (Some(min), Some(max)) = (
        stats.min.as_ref().and_then(as_numeric),
        stats.max.as_ref().and_then(as_numeric),
    ) else {
        return DEFAULT_SELECTIVITY;
    };
    let Some(v) = as_numeric(literal) else {
        return DEFAULT_SELECTIVITY;
    };

    if max <= min {
        return DEFAULT_SELECTIVITY;
    }
    let below = ((v - min) / (max - min)).clamp(0.0, 1.0) as f32;
    match op {
        CompareOp::Lt | CompareOp::Le => below,
        CompareOp::Gt | CompareOp::Ge => 1.0 - below,
        _ => DEFAULT_SELECTIVITY,
    }
}

fn as_numeric(v: &Value) -> Option<f64> {
    match v {
        Value::TinyInt(x) => Some(f64::from(*x)),
        Value::SmallInt(x) => Some(f64::from(*x)),
        Value::Int(x) => Some(f64::from(*x)),
        Value::BigInt(x) => Some(*x as f64),
        Value::Float(x) => Some(f64::from(*x)),
        Value::Double(x) => Some(*x),
        _ => None,
    }
}
