//! Bottom-up dynamic-programming join enumeration.
//!
//! Leaves (base tables, derived tables, outer and natural joins) become
//! singleton components; each DP round joins every component with every
//! disjoint leaf, keeping the cheapest plan per exact leaf set by cpu cost.
//! Every conjunct is applied exactly once: pushed into a leaf when its
//! symbols resolve there, attached to the lowest join whose combined schema
//! covers it, or applied on top after enumeration.

use crate::analyze::analyze_from;
use crate::{PlanContext, PlanNode, Planner, add_predicate_to_plan};
use common::{DbError, DbResult, Schema};
use expr::{Expr, FromClause, JoinCondition, JoinType, SelectValue};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// DP state: a candidate plan, the exact set of leaves it covers, and the
/// conjuncts already applied inside it (by index into the conjunct pool).
#[derive(Clone, Debug)]
pub struct JoinComponent {
    pub plan: PlanNode,
    pub leaves_used: BTreeSet<usize>,
    pub conjuncts_used: BTreeSet<usize>,
}

/// Plan a FROM tree with a set of WHERE conjuncts into a prepared plan that
/// produces the query's rows (not yet projected or sorted).
pub fn plan_from_clause(
    from: &FromClause,
    where_conjuncts: Vec<Expr>,
    ctx: &PlanContext,
) -> DbResult<PlanNode> {
    let analysis = analyze_from(from, where_conjuncts);
    let conjuncts = analysis.conjuncts;

    // Build singleton components, pushing applicable conjuncts into each
    // leaf as it is created.
    let mut components = Vec::with_capacity(analysis.leaves.len());
    for (leaf_id, leaf) in analysis.leaves.iter().enumerate() {
        let mut used = BTreeSet::new();
        let mut plan = make_leaf_plan(leaf, &conjuncts, &mut used, ctx)?;

        for (id, conjunct) in conjuncts.iter().enumerate() {
            if !used.contains(&id) && symbols_covered(conjunct, plan.schema()?)? {
                plan = add_predicate_to_plan(plan, conjunct.clone());
                plan.prepare(ctx)?;
                used.insert(id);
            }
        }

        components.push(JoinComponent {
            plan,
            leaves_used: BTreeSet::from([leaf_id]),
            conjuncts_used: used,
        });
    }

    let mut result = enumerate_joins(components, &conjuncts, ctx)?;

    // Any still-unused conjunct is applied at the top. An unresolvable
    // reference surfaces as a schema error when the filter prepares.
    let remaining: Vec<usize> = (0..conjuncts.len())
        .filter(|id| !result.conjuncts_used.contains(id))
        .collect();
    for id in remaining {
        result.plan = add_predicate_to_plan(result.plan, conjuncts[id].clone());
        result.plan.prepare(ctx)?;
        result.conjuncts_used.insert(id);
    }

    Ok(result.plan)
}

/// The DP proper: iterate generations until a single component covers every
/// leaf. Ties on cpu cost keep the first-seen plan, which together with the
/// ordered generation maps makes enumeration deterministic.
pub fn enumerate_joins(
    leaves: Vec<JoinComponent>,
    conjuncts: &[Expr],
    ctx: &PlanContext,
) -> DbResult<JoinComponent> {
    if leaves.is_empty() {
        return Err(DbError::Plan("FROM clause produced no join leaves".into()));
    }

    let mut current: BTreeMap<BTreeSet<usize>, JoinComponent> = leaves
        .iter()
        .map(|c| (c.leaves_used.clone(), c.clone()))
        .collect();

    let mut generation = 0;
    while current.len() > 1 {
        generation += 1;
        let mut next: BTreeMap<BTreeSet<usize>, JoinComponent> = BTreeMap::new();

        for component in current.values() {
            for leaf in &leaves {
                // The DP never joins two plans with overlapping leaf sets.
                if !component.leaves_used.is_disjoint(&leaf.leaves_used) {
                    continue;
                }

                let combined_used: BTreeSet<usize> = component
                    .conjuncts_used
                    .union(&leaf.conjuncts_used)
                    .copied()
                    .collect();

                let joined_schema = component.plan.schema()?.join(leaf.plan.schema()?);
                let mut applied_ids = Vec::new();
                let mut applied = Vec::new();
                for (id, conjunct) in conjuncts.iter().enumerate() {
                    if !combined_used.contains(&id)
                        && symbols_covered(conjunct, &joined_schema)?
                    {
                        applied_ids.push(id);
                        applied.push(conjunct.clone());
                    }
                }
                let predicate = if applied.is_empty() {
                    None
                } else {
                    Some(Expr::and_of(applied))
                };

                let mut plan = PlanNode::nested_loops_join(
                    component.plan.clone(),
                    leaf.plan.clone(),
                    JoinType::Inner,
                    predicate,
                );
                plan.prepare(ctx)?;
                let cpu = plan.cost()?.cpu_cost;

                let key: BTreeSet<usize> = component
                    .leaves_used
                    .union(&leaf.leaves_used)
                    .copied()
                    .collect();
                let mut conjuncts_used = combined_used;
                conjuncts_used.extend(applied_ids.iter().copied());

                let install = match next.get(&key) {
                    None => true,
                    Some(existing) => cpu < existing.plan.cost()?.cpu_cost,
                };
                if install {
                    next.insert(
                        key.clone(),
                        JoinComponent {
                            plan,
                            leaves_used: key,
                            conjuncts_used,
                        },
                    );
                }
            }
        }

        debug!(generation, candidates = next.len(), "join enumeration round");
        current = next;
    }

    let (_, component) = current
        .into_iter()
        .next()
        .ok_or_else(|| DbError::Plan("join enumeration produced no plan".into()))?;
    Ok(component)
}

/// Build the plan for one leaf. `used` collects the ids of conjuncts the
/// leaf consumed internally (outer-join preserved-side pushdown).
fn make_leaf_plan(
    leaf: &FromClause,
    conjuncts: &[Expr],
    used: &mut BTreeSet<usize>,
    ctx: &PlanContext,
) -> DbResult<PlanNode> {
    match leaf {
        FromClause::BaseTable { table, alias } => {
            let mut plan = PlanNode::file_scan(table.clone());
            if let Some(alias) = alias {
                plan = PlanNode::rename(plan, alias.clone());
            }
            plan.prepare(ctx)?;
            Ok(plan)
        }
        FromClause::Derived { query, alias } => {
            let inner = Planner::plan_select(query, ctx)?;
            let mut plan = PlanNode::rename(inner, alias.clone());
            plan.prepare(ctx)?;
            Ok(plan)
        }
        FromClause::Join {
            left,
            right,
            join_type,
            condition,
        } => {
            let mut left_plan = plan_from_clause(left, Vec::new(), ctx)?;
            let mut right_plan = plan_from_clause(right, Vec::new(), ctx)?;

            // Push outer conjuncts only into the side the join preserves;
            // pushing into the other side would change which rows get
            // NULL-padded. Inner natural joins preserve both sides.
            let (push_left, push_right) = match join_type {
                JoinType::LeftOuter => (true, false),
                JoinType::RightOuter => (false, true),
                JoinType::FullOuter => (false, false),
                JoinType::Inner | JoinType::Cross => (true, true),
            };
            if push_left {
                push_covered(&mut left_plan, conjuncts, used, ctx)?;
            }
            if push_right {
                push_covered(&mut right_plan, conjuncts, used, ctx)?;
            }

            match condition {
                JoinCondition::On(pred) => {
                    let mut plan = PlanNode::nested_loops_join(
                        left_plan,
                        right_plan,
                        *join_type,
                        Some(pred.clone()),
                    );
                    plan.prepare(ctx)?;
                    Ok(plan)
                }
                JoinCondition::None => {
                    let mut plan =
                        PlanNode::nested_loops_join(left_plan, right_plan, *join_type, None);
                    plan.prepare(ctx)?;
                    Ok(plan)
                }
                JoinCondition::Natural => {
                    natural_join_plan(left_plan, right_plan, *join_type, None, ctx)
                }
                JoinCondition::Using(cols) => {
                    natural_join_plan(left_plan, right_plan, *join_type, Some(cols), ctx)
                }
            }
        }
    }
}

/// Push every still-unused conjunct that resolves against `plan` into it.
fn push_covered(
    plan: &mut PlanNode,
    conjuncts: &[Expr],
    used: &mut BTreeSet<usize>,
    ctx: &PlanContext,
) -> DbResult<()> {
    for (id, conjunct) in conjuncts.iter().enumerate() {
        if !used.contains(&id) && symbols_covered(conjunct, plan.schema()?)? {
            let pushed = add_predicate_to_plan(plan.clone(), conjunct.clone());
            *plan = pushed;
            plan.prepare(ctx)?;
            used.insert(id);
        }
    }
    Ok(())
}

/// Build a NATURAL or USING join: a nested-loops join over the equality of
/// the shared columns, topped by a projection that emits each shared column
/// once and then the remaining columns of both sides.
fn natural_join_plan(
    left: PlanNode,
    right: PlanNode,
    join_type: JoinType,
    using: Option<&[String]>,
    ctx: &PlanContext,
) -> DbResult<PlanNode> {
    let left_schema = left.schema()?.clone();
    let right_schema = right.schema()?.clone();

    let shared = match using {
        Some(cols) => cols.to_vec(),
        None => left_schema
            .columns()
            .iter()
            .map(|c| c.name.clone())
            .filter(|name| {
                right_schema.contains(&common::ColumnName::unqualified(name.clone()))
            })
            .collect(),
    };

    let mut pairs = Vec::with_capacity(shared.len());
    for name in &shared {
        let l = column_ref(&left_schema, name)?;
        let r = column_ref(&right_schema, name)?;
        pairs.push((l, r));
    }

    let condition = if pairs.is_empty() {
        None
    } else {
        Some(Expr::and_of(
            pairs
                .iter()
                .map(|(l, r)| {
                    Expr::compare(l.clone(), expr::CompareOp::Eq, r.clone())
                })
                .collect(),
        ))
    };

    let mut join = PlanNode::nested_loops_join(left, right, join_type, condition);
    join.prepare(ctx)?;

    // Shared columns collapse to a single output column. The preserved side
    // supplies the value; a FULL OUTER join coalesces the two sides.
    let mut values = Vec::new();
    for ((l, r), name) in pairs.iter().zip(&shared) {
        let expr = match join_type {
            JoinType::RightOuter => r.clone(),
            JoinType::FullOuter => Expr::FunctionCall {
                name: "COALESCE".into(),
                args: vec![l.clone(), r.clone()],
            },
            _ => l.clone(),
        };
        values.push(SelectValue::Expression {
            expr,
            alias: Some(name.clone()),
        });
    }
    let is_shared = |col: &common::ColumnInfo| {
        shared.iter().any(|name| col.name.eq_ignore_ascii_case(name))
    };
    for schema in [&left_schema, &right_schema] {
        for col in schema.columns().iter().filter(|c| !is_shared(c)) {
            values.push(SelectValue::Expression {
                expr: Expr::ColumnRef(col.column_name()),
                alias: None,
            });
        }
    }

    let mut plan = PlanNode::project(join, values);
    plan.prepare(ctx)?;
    Ok(plan)
}

/// A reference to `name` within one side's schema, qualified when possible
/// so it stays unambiguous in the joined schema.
fn column_ref(schema: &Schema, name: &str) -> DbResult<Expr> {
    let idx = schema.find_column(&common::ColumnName::unqualified(name))?;
    let col = schema.column(idx).expect("index from lookup");
    Ok(Expr::ColumnRef(col.column_name()))
}

/// Whether every column the expression references resolves in `schema`.
/// Ambiguous unqualified references propagate as schema errors.
fn symbols_covered(expr: &Expr, schema: &Schema) -> DbResult<bool> {
    let mut symbols = BTreeSet::new();
    expr.all_symbols(&mut symbols);
    for symbol in symbols {
        if schema.column_index(&symbol)?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}
