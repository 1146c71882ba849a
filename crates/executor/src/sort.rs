//! Sort operator: materialise, order, and replay.

use crate::{ExecutionContext, Executor};
use common::{DbResult, Schema, Tuple};
use expr::Environment;
use planner::SortKey;
use std::cmp::Ordering;
use types::{Value, coerce};

/// Blocking operator: consumes its entire input on the first `next`, sorts
/// with a stable comparison, then streams the buffer. ASC places NULLs
/// last, DESC places them first. Buffered tuples are materialised copies,
/// so marking over the buffer is cheap, and the given ordering is
/// advertised truthfully.
pub struct SortExec {
    input: Box<dyn Executor>,
    keys: Vec<SortKey>,
    sorted: Option<Vec<Tuple>>,
    cursor: usize,
    marked: Option<usize>,
}

impl SortExec {
    pub fn new(input: Box<dyn Executor>, keys: Vec<SortKey>) -> Self {
        Self {
            input,
            keys,
            sorted: None,
            cursor: 0,
            marked: None,
        }
    }

    fn materialize(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let mut rows: Vec<(Vec<Value>, Tuple)> = Vec::new();
        while let Some(tuple) = self.input.next(ctx)? {
            let tuple = tuple.into_cacheable();
            let env = Environment::single(self.input.schema(), &tuple);
            let mut key_values = Vec::with_capacity(self.keys.len());
            for key in &self.keys {
                key_values.push(key.expr.evaluate(&env)?);
            }
            rows.push((key_values, tuple));
        }

        let keys = &self.keys;
        rows.sort_by(|(a, _), (b, _)| compare_key_values(a, b, keys));

        self.sorted = Some(rows.into_iter().map(|(_, t)| t).collect());
        self.cursor = 0;
        Ok(())
    }
}

impl Executor for SortExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.sorted = None;
        self.cursor = 0;
        self.marked = None;
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        if self.sorted.is_none() {
            self.materialize(ctx)?;
        }
        let rows = self.sorted.as_ref().expect("materialised above");
        if self.cursor >= rows.len() {
            return Ok(None);
        }
        let row = rows[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.sorted = None;
        self.marked = None;
        self.input.close(ctx)
    }

    fn schema(&self) -> &Schema {
        self.input.schema()
    }

    fn supports_marking(&self) -> bool {
        true
    }

    fn mark(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.marked = Some(self.cursor);
        Ok(())
    }

    fn reset_to_mark(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.cursor = self
            .marked
            .ok_or_else(|| common::DbError::Plan("reset without mark".into()))?;
        Ok(())
    }

    fn results_ordered_by(&self) -> Option<&[SortKey]> {
        Some(&self.keys)
    }
}

fn compare_key_values(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for (i, key) in keys.iter().enumerate() {
        let (va, vb) = (&a[i], &b[i]);
        let ord = match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            // ASC: NULLs last. DESC: NULLs first.
            (true, false) => {
                if key.ascending {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, true) => {
                if key.ascending {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, false) => {
                let ord = coerce::compare(va, vb)
                    .ok()
                    .flatten()
                    .unwrap_or(Ordering::Equal);
                if key.ascending { ord } else { ord.reverse() }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
