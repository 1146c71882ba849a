//! Query planner: plan-node templates, cost estimation, and the
//! dynamic-programming join enumerator.
//!
//! A [`PlanNode`] is a template: it owns expressions and operator parameters
//! but no execution state, so the join enumerator can clone a leaf into many
//! candidate joins. `prepare` computes and caches each node's output schema,
//! column statistics and [`PlanCost`] (children first); executor instances
//! are built from prepared templates by the `executor` crate.
//!
//! # Pipeline
//!
//! ```text
//! SelectClause
//!     ↓  FROM analysis (leaves vs inner-join conjuncts)
//!     ↓  leaf plans + predicate pushdown
//!     ↓  bottom-up DP join enumeration (cpu cost objective)
//!     ↓  remaining conjuncts, projection, sort, limit
//! prepared PlanNode tree
//! ```

mod analyze;
pub mod cost;
mod explain;
mod join_planner;
pub mod selectivity;
#[cfg(test)]
mod tests;

pub use analyze::FromAnalysis;
pub use cost::PlanCost;
pub use explain::explain_plan;
pub use join_planner::plan_from_clause;
pub use selectivity::{DEFAULT_SELECTIVITY, estimate_selectivity};

use catalog::{Catalog, ColumnStats};
use common::{ColumnInfo, DbError, DbResult, Schema};
use expr::{Expr, JoinType, SelectClause, SelectValue};
use tracing::debug;
use types::SqlType;

/// Assumed table size when a table has never been analysed; affects cost
/// estimates only.
const UNKNOWN_TABLE_TUPLES: f32 = 1000.0;
const UNKNOWN_TABLE_PAGES: u64 = 10;

/// Planning context - holds the catalog for schema and statistics lookups.
pub struct PlanContext<'a> {
    pub catalog: &'a Catalog,
}

impl<'a> PlanContext<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }
}

/// One ORDER BY key of a sort node.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
}

/// A plan-node template with lazily-populated schema/stats/cost.
#[derive(Clone, Debug)]
pub struct PlanNode {
    pub op: PlanOp,
    props: Option<PlanProps>,
}

/// Operation kinds of the plan tree.
#[derive(Clone, Debug)]
pub enum PlanOp {
    /// Leaf: stream all tuples of a table, applying `predicate` if present.
    FileScan {
        table: String,
        predicate: Option<Expr>,
    },
    /// Pass through tuples satisfying the predicate.
    Filter {
        child: Box<PlanNode>,
        predicate: Expr,
    },
    /// Evaluate a select list (wildcards already carried symbolically).
    Project {
        child: Box<PlanNode>,
        values: Vec<SelectValue>,
    },
    /// Materialise and sort the child's output.
    Sort {
        child: Box<PlanNode>,
        keys: Vec<SortKey>,
    },
    /// Rewrite the output schema's table qualifier; tuples pass through.
    Rename {
        child: Box<PlanNode>,
        table: String,
    },
    /// Two-level-cursor nested loops join.
    ///
    /// `join_type` is never `RightOuter` here: the constructor swaps the
    /// children once and records `schema_swapped`, and emission restores the
    /// SQL-standard column order.
    NestedLoopsJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        join_type: JoinType,
        predicate: Option<Expr>,
        schema_swapped: bool,
    },
    /// Skip `offset` tuples then emit at most `limit`.
    Limit {
        child: Box<PlanNode>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
}

#[derive(Clone, Debug)]
struct PlanProps {
    schema: Schema,
    stats: Vec<ColumnStats>,
    cost: PlanCost,
}

impl PlanNode {
    fn new(op: PlanOp) -> Self {
        Self { op, props: None }
    }

    pub fn file_scan(table: impl Into<String>) -> Self {
        Self::new(PlanOp::FileScan {
            table: table.into(),
            predicate: None,
        })
    }

    pub fn filter(child: PlanNode, predicate: Expr) -> Self {
        Self::new(PlanOp::Filter {
            child: Box::new(child),
            predicate,
        })
    }

    pub fn project(child: PlanNode, values: Vec<SelectValue>) -> Self {
        Self::new(PlanOp::Project {
            child: Box::new(child),
            values,
        })
    }

    pub fn sort(child: PlanNode, keys: Vec<SortKey>) -> Self {
        Self::new(PlanOp::Sort {
            child: Box::new(child),
            keys,
        })
    }

    pub fn rename(child: PlanNode, table: impl Into<String>) -> Self {
        Self::new(PlanOp::Rename {
            child: Box::new(child),
            table: table.into(),
        })
    }

    pub fn limit(child: PlanNode, limit: Option<u64>, offset: Option<u64>) -> Self {
        Self::new(PlanOp::Limit {
            child: Box::new(child),
            limit,
            offset,
        })
    }

    /// Build a nested-loops join. A RIGHT OUTER join is normalised here:
    /// children are swapped, the type becomes LEFT OUTER, and
    /// `schema_swapped` records that emission must restore column order.
    pub fn nested_loops_join(
        left: PlanNode,
        right: PlanNode,
        join_type: JoinType,
        predicate: Option<Expr>,
    ) -> Self {
        let (left, right, join_type, schema_swapped) = match join_type {
            JoinType::RightOuter => (right, left, JoinType::LeftOuter, true),
            other => (left, right, other, false),
        };
        Self::new(PlanOp::NestedLoopsJoin {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            predicate,
            schema_swapped,
        })
    }

    pub fn is_prepared(&self) -> bool {
        self.props.is_some()
    }

    /// Output schema; only valid after `prepare`.
    pub fn schema(&self) -> DbResult<&Schema> {
        self.props
            .as_ref()
            .map(|p| &p.schema)
            .ok_or_else(|| DbError::Plan("plan node not prepared".into()))
    }

    /// Estimated cost; only valid after `prepare`.
    pub fn cost(&self) -> DbResult<PlanCost> {
        self.props
            .as_ref()
            .map(|p| p.cost)
            .ok_or_else(|| DbError::Plan("plan node not prepared".into()))
    }

    /// Per-column statistics aligned with the output schema.
    pub fn column_stats(&self) -> DbResult<&[ColumnStats]> {
        self.props
            .as_ref()
            .map(|p| p.stats.as_slice())
            .ok_or_else(|| DbError::Plan("plan node not prepared".into()))
    }

    /// Compute schema, statistics and cost for this node, preparing all
    /// children first. Errors here are fatal to the query.
    pub fn prepare(&mut self, ctx: &PlanContext) -> DbResult<()> {
        let props = match &mut self.op {
            PlanOp::FileScan { table, predicate } => {
                let meta = ctx
                    .catalog
                    .table(table)
                    .map_err(|e| DbError::Plan(e.to_string()))?;
                let schema = meta.schema.to_schema(&meta.name);

                let mut stats = meta.stats.columns.clone();
                stats.resize(schema.column_count(), ColumnStats::default());

                let (num_tuples, num_pages) =
                    if meta.stats.num_tuples == 0 && meta.stats.num_pages == 0 {
                        (UNKNOWN_TABLE_TUPLES, UNKNOWN_TABLE_PAGES)
                    } else {
                        (meta.stats.num_tuples as f32, meta.stats.num_pages)
                    };

                let selectivity = match predicate {
                    Some(pred) => {
                        check_predicate(pred, &schema)?;
                        estimate_selectivity(pred, &schema, &stats)
                    }
                    None => 1.0,
                };

                PlanProps {
                    cost: PlanCost::new(
                        num_tuples * selectivity,
                        meta.stats.avg_tuple_size,
                        num_tuples,
                        num_pages,
                    ),
                    schema,
                    stats,
                }
            }
            PlanOp::Filter { child, predicate } => {
                child.prepare(ctx)?;
                let schema = child.schema()?.clone();
                check_predicate(predicate, &schema)?;
                let stats = child.column_stats()?.to_vec();
                let child_cost = child.cost()?;
                let selectivity = estimate_selectivity(predicate, &schema, &stats);
                PlanProps {
                    cost: PlanCost::new(
                        child_cost.num_tuples * selectivity,
                        child_cost.avg_tuple_size,
                        child_cost.cpu_cost + child_cost.num_tuples,
                        child_cost.num_block_ios,
                    ),
                    schema,
                    stats,
                }
            }
            PlanOp::Project { child, values } => {
                child.prepare(ctx)?;
                let child_schema = child.schema()?;
                let (schema, items) = resolve_projection(values, child_schema)?;
                let child_stats = child.column_stats()?;
                let stats = items
                    .iter()
                    .map(|item| match item.source {
                        ProjectSource::Column(i) => {
                            child_stats.get(i).cloned().unwrap_or_default()
                        }
                        ProjectSource::Computed(_) => ColumnStats::default(),
                    })
                    .collect();
                let child_cost = child.cost()?;
                let width_ratio = if child_schema.column_count() == 0 {
                    1.0
                } else {
                    schema.column_count() as f32 / child_schema.column_count() as f32
                };
                PlanProps {
                    cost: PlanCost::new(
                        child_cost.num_tuples,
                        child_cost.avg_tuple_size * width_ratio,
                        child_cost.cpu_cost + child_cost.num_tuples,
                        child_cost.num_block_ios,
                    ),
                    schema,
                    stats,
                }
            }
            PlanOp::Sort { child, keys } => {
                child.prepare(ctx)?;
                let schema = child.schema()?.clone();
                for key in keys.iter() {
                    key.expr.column_info(&schema)?;
                }
                let child_cost = child.cost()?;
                let n = child_cost.num_tuples.max(1.0);
                PlanProps {
                    cost: PlanCost::new(
                        child_cost.num_tuples,
                        child_cost.avg_tuple_size,
                        child_cost.cpu_cost + n * n.log2().max(1.0),
                        child_cost.num_block_ios,
                    ),
                    stats: child.column_stats()?.to_vec(),
                    schema,
                }
            }
            PlanOp::Rename { child, table } => {
                child.prepare(ctx)?;
                PlanProps {
                    schema: child.schema()?.with_qualifier(table),
                    stats: child.column_stats()?.to_vec(),
                    cost: child.cost()?,
                }
            }
            PlanOp::NestedLoopsJoin {
                left,
                right,
                join_type,
                predicate,
                schema_swapped,
            } => {
                left.prepare(ctx)?;
                right.prepare(ctx)?;

                // With swapped children the stored left child is the
                // original right input; the output schema keeps the
                // SQL-standard order.
                let (schema, stats) = if *schema_swapped {
                    let schema = right.schema()?.join(left.schema()?);
                    let mut stats = right.column_stats()?.to_vec();
                    stats.extend_from_slice(left.column_stats()?);
                    (schema, stats)
                } else {
                    let schema = left.schema()?.join(right.schema()?);
                    let mut stats = left.column_stats()?.to_vec();
                    stats.extend_from_slice(right.column_stats()?);
                    (schema, stats)
                };

                let selectivity = match predicate {
                    Some(pred) => {
                        check_predicate(pred, &schema)?;
                        estimate_selectivity(pred, &schema, &stats)
                    }
                    None => 1.0,
                };

                let l = left.cost()?;
                let r = right.cost()?;
                let pairs = l.num_tuples * r.num_tuples;
                let inner_tuples = pairs * selectivity;
                let num_tuples = match join_type {
                    JoinType::Inner | JoinType::Cross => inner_tuples,
                    JoinType::LeftOuter => inner_tuples.max(l.num_tuples),
                    JoinType::FullOuter => inner_tuples.max(l.num_tuples).max(r.num_tuples),
                    JoinType::RightOuter => unreachable!("normalised at construction"),
                };

                PlanProps {
                    cost: PlanCost::new(
                        num_tuples,
                        l.avg_tuple_size + r.avg_tuple_size,
                        l.cpu_cost + l.num_tuples * r.cpu_cost + pairs,
                        l.num_block_ios + r.num_block_ios,
                    ),
                    schema,
                    stats,
                }
            }
            PlanOp::Limit {
                child,
                limit,
                offset,
            } => {
                child.prepare(ctx)?;
                let child_cost = child.cost()?;
                let after_offset =
                    (child_cost.num_tuples - offset.unwrap_or(0) as f32).max(0.0);
                let num_tuples = match limit {
                    Some(n) => after_offset.min(*n as f32),
                    None => after_offset,
                };
                PlanProps {
                    schema: child.schema()?.clone(),
                    stats: child.column_stats()?.to_vec(),
                    cost: PlanCost::new(
                        num_tuples,
                        child_cost.avg_tuple_size,
                        child_cost.cpu_cost,
                        child_cost.num_block_ios,
                    ),
                }
            }
        };

        self.props = Some(props);
        Ok(())
    }
}

/// Verify a predicate resolves against `schema` and produces a boolean.
fn check_predicate(predicate: &Expr, schema: &Schema) -> DbResult<()> {
    let info = predicate.column_info(schema)?;
    if info.ty != SqlType::Bool {
        return Err(DbError::Type(format!(
            "predicate must be boolean, got {}",
            info.ty
        )));
    }
    Ok(())
}

/// Where a projected column's values come from at execution time.
#[derive(Clone, Debug, PartialEq)]
pub enum ProjectSource {
    /// Pass the child tuple's column through unchanged.
    Column(usize),
    /// Evaluate an expression against the child tuple.
    Computed(Expr),
}

/// One resolved entry of a projection.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectItem {
    pub info: ColumnInfo,
    pub source: ProjectSource,
}

/// Expand a select list against the child's schema, left to right.
///
/// `*` expands to all child columns, `qualifier.*` to the qualified subset,
/// and expressions resolve through `column_info`. Plain column references
/// become pass-through items.
pub fn resolve_projection(
    values: &[SelectValue],
    child: &Schema,
) -> DbResult<(Schema, Vec<ProjectItem>)> {
    let mut items = Vec::new();

    for value in values {
        match value {
            SelectValue::Wildcard => {
                for (i, col) in child.columns().iter().enumerate() {
                    items.push(ProjectItem {
                        info: col.clone(),
                        source: ProjectSource::Column(i),
                    });
                }
            }
            SelectValue::TableWildcard(qualifier) => {
                let before = items.len();
                for (i, col) in child.columns().iter().enumerate() {
                    if col
                        .table
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case(qualifier))
                    {
                        items.push(ProjectItem {
                            info: col.clone(),
                            source: ProjectSource::Column(i),
                        });
                    }
                }
                if items.len() == before {
                    return Err(DbError::Schema(format!(
                        "unknown table '{qualifier}' in '{qualifier}.*'"
                    )));
                }
            }
            SelectValue::Expression { expr, alias } => {
                let item = match expr {
                    Expr::ColumnRef(name) => {
                        let idx = child.find_column(name)?;
                        let mut info = child.column(idx).cloned().expect("index from lookup");
                        if let Some(alias) = alias {
                            info.table = None;
                            info.name = alias.clone();
                        }
                        ProjectItem {
                            info,
                            source: ProjectSource::Column(idx),
                        }
                    }
                    other => {
                        let mut info = other.column_info(child)?;
                        if let Some(alias) = alias {
                            info.table = None;
                            info.name = alias.clone();
                        }
                        ProjectItem {
                            info,
                            source: ProjectSource::Computed(other.clone()),
                        }
                    }
                };
                items.push(item);
            }
        }
    }

    let schema = Schema::new(items.iter().map(|i| i.info.clone()).collect());
    Ok((schema, items))
}

/// A projection is trivial when it reproduces the child schema exactly; the
/// planner omits the node in that case.
pub fn is_trivial_projection(items: &[ProjectItem], child: &Schema) -> bool {
    items.len() == child.column_count()
        && items.iter().enumerate().all(|(pos, item)| {
            matches!(item.source, ProjectSource::Column(i) if i == pos)
                && child.column(pos) == Some(&item.info)
        })
}

/// Attach a predicate to the lowest sensible point of an existing plan.
///
/// Nodes with an optional predicate slot (file scan, filter) absorb the new
/// predicate, flattening into their AND; any other node is wrapped in a
/// filter. The returned plan is unprepared.
pub fn add_predicate_to_plan(plan: PlanNode, predicate: Expr) -> PlanNode {
    match plan.op {
        PlanOp::FileScan {
            table,
            predicate: existing,
        } => {
            let merged = match existing {
                Some(p) => Expr::and(p, predicate),
                None => predicate,
            };
            PlanNode::new(PlanOp::FileScan {
                table,
                predicate: Some(merged),
            })
        }
        PlanOp::Filter {
            child,
            predicate: existing,
        } => PlanNode::new(PlanOp::Filter {
            child,
            predicate: Expr::and(existing, predicate),
        }),
        op => PlanNode::filter(PlanNode::new(op), predicate),
    }
}

/// Names commonly used as aggregate functions; the planner refuses them
/// because it has no aggregation operator.
const AGGREGATE_NAMES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

fn contains_aggregate(values: &[SelectValue]) -> bool {
    fn expr_has_aggregate(e: &Expr) -> bool {
        match e {
            Expr::FunctionCall { name, args } => {
                AGGREGATE_NAMES.contains(&name.trim().to_uppercase().as_str())
                    || args.iter().any(expr_has_aggregate)
            }
            Expr::Arith { left, right, .. } | Expr::Compare { left, right, .. } => {
                expr_has_aggregate(left) || expr_has_aggregate(right)
            }
            Expr::Boolean { terms, .. } => terms.iter().any(expr_has_aggregate),
            Expr::Not(e) | Expr::IsNull { expr: e, .. } => expr_has_aggregate(e),
            _ => false,
        }
    }
    values.iter().any(|v| match v {
        SelectValue::Expression { expr, .. } => expr_has_aggregate(expr),
        _ => false,
    })
}

/// Main planner entry point.
pub struct Planner;

impl Planner {
    /// Plan a SELECT into a prepared plan tree.
    ///
    /// The join enumerator produces the row source; projection (unless
    /// trivial), ORDER BY sort and LIMIT are layered on top.
    pub fn plan_select(select: &SelectClause, ctx: &PlanContext) -> DbResult<PlanNode> {
        if !select.group_by.is_empty() || select.having.is_some() {
            return Err(DbError::Plan(
                "GROUP BY / HAVING are not supported by this planner".into(),
            ));
        }
        if select.distinct {
            return Err(DbError::Plan("SELECT DISTINCT is not supported".into()));
        }
        if contains_aggregate(&select.values) {
            return Err(DbError::Plan(
                "aggregate functions are not supported by this planner".into(),
            ));
        }

        let from = select
            .from
            .as_ref()
            .ok_or_else(|| DbError::Plan("SELECT requires a FROM clause".into()))?;

        let conjuncts = match &select.where_clause {
            Some(pred) => pred.clone().into_conjuncts(),
            None => Vec::new(),
        };

        let mut plan = plan_from_clause(from, conjuncts, ctx)?;

        let keys: Vec<SortKey> = select
            .order_by
            .iter()
            .map(|o| SortKey {
                expr: o.expr.clone(),
                ascending: o.ascending,
            })
            .collect();

        // Trivial projections are detected at planning time and omitted.
        let (projected_schema, items) = resolve_projection(&select.values, plan.schema()?)?;
        let trivial = is_trivial_projection(&items, plan.schema()?);

        // Sort keys may reference columns the projection drops (`SELECT v
        // ... ORDER BY id`); such a sort goes below the projection.
        let sort_above = keys
            .iter()
            .all(|k| k.expr.column_info(&projected_schema).is_ok());

        if !keys.is_empty() && !sort_above {
            plan = PlanNode::sort(plan, keys.clone());
            plan.prepare(ctx)?;
        }

        if !trivial {
            plan = PlanNode::project(plan, select.values.clone());
            plan.prepare(ctx)?;
        }

        if !keys.is_empty() && sort_above {
            plan = PlanNode::sort(plan, keys);
            plan.prepare(ctx)?;
        }

        if select.limit.is_some() || select.offset.is_some() {
            plan = PlanNode::limit(plan, select.limit, select.offset);
            plan.prepare(ctx)?;
        }

        let cost = plan.cost()?;
        debug!(%cost, "planned SELECT");
        Ok(plan)
    }
}
