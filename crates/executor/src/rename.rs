//! Rename: schema-only change, tuples pass through untouched.

use crate::{ExecutionContext, Executor};
use common::{DbResult, Schema, Tuple};
use planner::SortKey;

/// Exposes the child's tuples under a rewritten table qualifier (FROM
/// aliases and derived tables). Everything delegates to the child.
pub struct RenameExec {
    input: Box<dyn Executor>,
    schema: Schema,
}

impl RenameExec {
    pub fn new(input: Box<dyn Executor>, schema: Schema) -> Self {
        Self { input, schema }
    }
}

impl Executor for RenameExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        self.input.next(ctx)
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn supports_marking(&self) -> bool {
        self.input.supports_marking()
    }

    fn mark(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.mark(ctx)
    }

    fn reset_to_mark(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.reset_to_mark(ctx)
    }

    fn results_ordered_by(&self) -> Option<&[SortKey]> {
        self.input.results_ordered_by()
    }
}
