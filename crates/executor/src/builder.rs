//! Build executor trees from prepared plan templates.

use crate::{
    Executor, FileScanExec, FilterExec, LimitExec, NestedLoopsJoinExec, ProjectExec, RenameExec,
    SortExec,
};
use catalog::Catalog;
use common::{DbError, DbResult};
use planner::{PlanNode, PlanOp, resolve_projection};

/// Turn a prepared plan into its operator tree.
///
/// Fails with a `Plan` error when a node was not prepared, since operator
/// construction needs the cached schemas.
pub fn build_executor(plan: &PlanNode, catalog: &Catalog) -> DbResult<Box<dyn Executor>> {
    let schema = plan.schema()?.clone();

    Ok(match &plan.op {
        PlanOp::FileScan { table, predicate } => {
            let meta = catalog
                .table(table)
                .map_err(|e| DbError::Plan(e.to_string()))?;
            Box::new(FileScanExec::new(meta.id, schema, predicate.clone()))
        }
        PlanOp::Filter { child, predicate } => Box::new(FilterExec::new(
            build_executor(child, catalog)?,
            predicate.clone(),
        )),
        PlanOp::Project { child, values } => {
            let child_schema = child.schema()?;
            let (_, items) = resolve_projection(values, child_schema)?;
            Box::new(ProjectExec::new(
                build_executor(child, catalog)?,
                items,
                schema,
            ))
        }
        PlanOp::Sort { child, keys } => Box::new(SortExec::new(
            build_executor(child, catalog)?,
            keys.clone(),
        )),
        PlanOp::Rename { child, .. } => Box::new(RenameExec::new(
            build_executor(child, catalog)?,
            schema,
        )),
        PlanOp::NestedLoopsJoin {
            left,
            right,
            join_type,
            predicate,
            schema_swapped,
        } => Box::new(
            NestedLoopsJoinExec::builder()
                .left(build_executor(left, catalog)?)
                .right(build_executor(right, catalog)?)
                .join_type(*join_type)
                .maybe_predicate(predicate.clone())
                .schema(schema)
                .schema_swapped(*schema_swapped)
                .build(),
        ),
        PlanOp::Limit {
            child,
            limit,
            offset,
        } => Box::new(LimitExec::new(
            build_executor(child, catalog)?,
            *limit,
            *offset,
        )),
    })
}
