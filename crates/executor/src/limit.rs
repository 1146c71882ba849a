//! LIMIT/OFFSET: bound the number of emitted tuples.

use crate::{ExecutionContext, Executor};
use common::{DbResult, Schema, Tuple};
use planner::SortKey;

/// Skips `offset` tuples, then emits at most `limit`.
pub struct LimitExec {
    input: Box<dyn Executor>,
    limit: Option<u64>,
    offset: Option<u64>,
    skipped: u64,
    emitted: u64,
}

impl LimitExec {
    pub fn new(input: Box<dyn Executor>, limit: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            input,
            limit,
            offset,
            skipped: 0,
            emitted: 0,
        }
    }
}

impl Executor for LimitExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.skipped = 0;
        self.emitted = 0;
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return Ok(None);
            }
        }

        while self.skipped < self.offset.unwrap_or(0) {
            if self.input.next(ctx)?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }

        match self.input.next(ctx)? {
            Some(tuple) => {
                self.emitted += 1;
                Ok(Some(tuple))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn results_ordered_by(&self) -> Option<&[SortKey]> {
        self.input.results_ordered_by()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{MockExec, TestDb, int_text_tuple, t1_schema};
    use types::Value;

    fn rows() -> Vec<Tuple> {
        (1..=5).map(|i| int_text_tuple(i, "r")).collect()
    }

    fn collect_ids(db: &mut TestDb, limit: Option<u64>, offset: Option<u64>) -> Vec<Value> {
        let input = MockExec::new(rows(), t1_schema());
        let mut exec = LimitExec::new(Box::new(input), limit, offset);
        let mut ctx = db.ctx();
        exec.open(&mut ctx).unwrap();
        let out: Vec<_> = std::iter::from_fn(|| exec.next(&mut ctx).unwrap())
            .map(|t| t.values[0].clone())
            .collect();
        exec.close(&mut ctx).unwrap();
        out
    }

    #[test]
    fn limit_truncates() {
        let mut db = TestDb::new();
        assert_eq!(
            collect_ids(&mut db, Some(2), None),
            vec![Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn offset_skips() {
        let mut db = TestDb::new();
        assert_eq!(
            collect_ids(&mut db, None, Some(3)),
            vec![Value::Int(4), Value::Int(5)]
        );
    }

    #[test]
    fn limit_and_offset_compose() {
        let mut db = TestDb::new();
        assert_eq!(
            collect_ids(&mut db, Some(2), Some(1)),
            vec![Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn offset_beyond_input_is_empty() {
        let mut db = TestDb::new();
        assert!(collect_ids(&mut db, None, Some(99)).is_empty());
    }
}
