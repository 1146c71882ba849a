//! Plan-tree rendering for EXPLAIN.

use crate::{PlanNode, PlanOp};
use std::fmt::Write;

/// Render a prepared plan as an indented tree with cost annotations.
pub fn explain_plan(plan: &PlanNode) -> String {
    let mut out = String::new();
    render(plan, 0, &mut out);
    out
}

fn render(plan: &PlanNode, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    let cost = plan
        .cost()
        .map(|c| format!(" [{c}]"))
        .unwrap_or_default();

    match &plan.op {
        PlanOp::FileScan { table, predicate } => {
            match predicate {
                Some(pred) => {
                    let _ = writeln!(out, "{indent}FileScan[{table}] pred: {pred}{cost}");
                }
                None => {
                    let _ = writeln!(out, "{indent}FileScan[{table}]{cost}");
                }
            };
        }
        PlanOp::Filter { child, predicate } => {
            let _ = writeln!(out, "{indent}Filter[{predicate}]{cost}");
            render(child, depth + 1, out);
        }
        PlanOp::Project { child, values } => {
            let cols = values.len();
            let _ = writeln!(out, "{indent}Project[{cols} columns]{cost}");
            render(child, depth + 1, out);
        }
        PlanOp::Sort { child, keys } => {
            let keys = keys
                .iter()
                .map(|k| {
                    format!("{} {}", k.expr, if k.ascending { "ASC" } else { "DESC" })
                })
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "{indent}Sort[{keys}]{cost}");
            render(child, depth + 1, out);
        }
        PlanOp::Rename { child, table } => {
            let _ = writeln!(out, "{indent}Rename[{table}]{cost}");
            render(child, depth + 1, out);
        }
        PlanOp::NestedLoopsJoin {
            left,
            right,
            join_type,
            predicate,
            schema_swapped,
        } => {
            let swapped = if *schema_swapped {
                " (schema swapped)"
            } else {
                ""
            };
            match predicate {
                Some(pred) => {
                    let _ = writeln!(
                        out,
                        "{indent}NestedLoopsJoin[{join_type}] on: {pred}{swapped}{cost}"
                    );
                }
                None => {
                    let _ = writeln!(out, "{indent}NestedLoopsJoin[{join_type}]{swapped}{cost}");
                }
            }
            render(left, depth + 1, out);
            render(right, depth + 1, out);
        }
        PlanOp::Limit {
            child,
            limit,
            offset,
        } => {
            let _ = writeln!(
                out,
                "{indent}Limit[limit={limit:?} offset={offset:?}]{cost}"
            );
            render(child, depth + 1, out);
        }
    }
}
