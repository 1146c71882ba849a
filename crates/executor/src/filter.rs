//! Filter operator: applies WHERE/HAVING-style predicates.

use crate::{ExecutionContext, Executor};
use common::{DbResult, Schema, Tuple};
use expr::{Environment, Expr};
use planner::SortKey;

/// Passes through tuples where the predicate evaluates to TRUE; UNKNOWN
/// drops the row. Marking and ordering delegate to the child.
pub struct FilterExec {
    input: Box<dyn Executor>,
    predicate: Expr,
}

impl FilterExec {
    pub fn new(input: Box<dyn Executor>, predicate: Expr) -> Self {
        Self { input, predicate }
    }
}

impl Executor for FilterExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        loop {
            let Some(tuple) = self.input.next(ctx)? else {
                return Ok(None);
            };
            let env = Environment::single(self.input.schema(), &tuple);
            if self.predicate.evaluate_predicate(&env)? {
                return Ok(Some(tuple));
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
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
