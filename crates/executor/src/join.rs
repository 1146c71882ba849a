//! Nested-loops join with INNER, CROSS, LEFT/FULL OUTER semantics.

use crate::{ExecutionContext, Executor};
use common::{DbResult, Schema, Tuple};
use expr::{Environment, Expr, JoinType};
use tracing::trace;
use types::Value;

/// Two-level-cursor nested loops join.
///
/// The left child drives the outer loop; the right child is materialised
/// once at `open` and swept per left tuple. The join type is never
/// `RightOuter` here: the planner swaps the children and sets
/// `schema_swapped`, and emission puts the inner tuple's values first so
/// the output keeps the SQL-standard column order.
///
/// Outer-join bookkeeping: a `matched` flag per left sweep (pre-set for
/// INNER/CROSS so padding never fires) and, for FULL OUTER, a bitmap over
/// the materialised right side that a drain phase consults to emit
/// NULL-padded unmatched right tuples.
pub struct NestedLoopsJoinExec {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    join_type: JoinType,
    predicate: Option<Expr>,
    schema: Schema,
    schema_swapped: bool,

    current_left: Option<Tuple>,
    left_matched: bool,
    right_rows: Vec<Tuple>,
    right_matched: Vec<bool>,
    right_cursor: usize,
    drain_cursor: usize,
    draining: bool,
}

#[bon::bon]
impl NestedLoopsJoinExec {
    #[builder]
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        join_type: JoinType,
        predicate: Option<Expr>,
        schema: Schema,
        schema_swapped: bool,
    ) -> Self {
        debug_assert!(
            join_type != JoinType::RightOuter,
            "right outer joins are normalised by the planner"
        );
        Self {
            left,
            right,
            join_type,
            predicate,
            schema,
            schema_swapped,
            current_left: None,
            left_matched: true,
            right_rows: Vec::new(),
            right_matched: Vec::new(),
            right_cursor: 0,
            drain_cursor: 0,
            draining: false,
        }
    }

    /// A fresh `matched` flag for a new left tuple: inner and cross joins
    /// never pad, so the flag starts true and padding can never fire.
    fn initial_matched(&self) -> bool {
        !matches!(self.join_type, JoinType::LeftOuter | JoinType::FullOuter)
    }

    /// Combine in SQL-standard column order: with swapped children the
    /// stored left child is the original right input, so its values go last.
    fn combine(&self, left: &Tuple, right: &Tuple) -> Tuple {
        let (first, second) = if self.schema_swapped {
            (right, left)
        } else {
            (left, right)
        };
        let mut values = first.values.clone();
        values.extend(second.values.iter().cloned());
        Tuple::new(values)
    }

    fn pad_unmatched_left(&self, left: &Tuple) -> Tuple {
        let nulls = vec![Value::Null; self.right.schema().column_count()];
        let right = Tuple::new(nulls);
        self.combine(left, &right)
    }

    fn pad_unmatched_right(&self, right: &Tuple) -> Tuple {
        let nulls = vec![Value::Null; self.left.schema().column_count()];
        let left = Tuple::new(nulls);
        self.combine(&left, right)
    }

    fn matches(&self, combined: &Tuple) -> DbResult<bool> {
        match &self.predicate {
            // No predicate: CROSS or unconditional join, every pair matches.
            None => Ok(true),
            Some(pred) => {
                let env = Environment::single(&self.schema, combined);
                pred.evaluate_predicate(&env)
            }
        }
    }

    fn advance_left(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.current_left = match self.left.next(ctx)? {
            Some(t) => Some(t.into_cacheable()),
            None => None,
        };
        self.left_matched = self.initial_matched();
        self.right_cursor = 0;
        Ok(())
    }
}

impl Executor for NestedLoopsJoinExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;

        // Materialise the right side for repeated sweeps; tuples must be
        // detached from their pages before they are retained.
        self.right_rows.clear();
        while let Some(tuple) = self.right.next(ctx)? {
            self.right_rows.push(tuple.into_cacheable());
        }
        self.right_matched = vec![false; self.right_rows.len()];
        trace!(
            join_type = %self.join_type,
            right_rows = self.right_rows.len(),
            "join open"
        );

        self.draining = false;
        self.drain_cursor = 0;
        self.advance_left(ctx)?;
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        loop {
            if self.draining {
                // FULL OUTER second phase: unmatched right tuples, padded.
                while self.drain_cursor < self.right_rows.len() {
                    let idx = self.drain_cursor;
                    self.drain_cursor += 1;
                    if !self.right_matched[idx] {
                        let padded = self.pad_unmatched_right(&self.right_rows[idx]);
                        return Ok(Some(padded));
                    }
                }
                return Ok(None);
            }

            let Some(left) = self.current_left.clone() else {
                if self.join_type == JoinType::FullOuter {
                    self.draining = true;
                    continue;
                }
                return Ok(None);
            };

            while self.right_cursor < self.right_rows.len() {
                let idx = self.right_cursor;
                self.right_cursor += 1;

                let combined = self.combine(&left, &self.right_rows[idx]);
                if self.matches(&combined)? {
                    self.left_matched = true;
                    self.right_matched[idx] = true;
                    return Ok(Some(combined));
                }
            }

            // Right side exhausted for this left tuple: pad before moving
            // on when the preserved side found no partner.
            let pad = !self.left_matched;
            self.advance_left(ctx)?;
            if pad {
                return Ok(Some(self.pad_unmatched_left(&left)));
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.right_rows.clear();
        self.right_matched.clear();
        self.current_left = None;
        self.left.close(ctx)?;
        self.right.close(ctx)?;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{MockExec, TestDb, int_text_tuple, t1_schema, t2_schema};
    use pretty_assertions::assert_eq;
    use types::Value;

    fn t1_rows() -> Vec<Tuple> {
        vec![
            int_text_tuple(1, "alpha"),
            int_text_tuple(2, "beta"),
            Tuple::new(vec![Value::Null, Value::Text("lorem".into())]),
        ]
    }

    fn t2_rows() -> Vec<Tuple> {
        vec![
            int_text_tuple(1, "A"),
            int_text_tuple(3, "C"),
            Tuple::new(vec![Value::Null, Value::Text("9".into())]),
        ]
    }

    fn join_exec(
        db: &TestDb,
        join_type: JoinType,
        swapped: bool,
        left_rows: Vec<Tuple>,
        right_rows: Vec<Tuple>,
    ) -> NestedLoopsJoinExec {
        // The combined schema is always t1 ⊕ t2 in SQL order.
        let schema = t1_schema().join(&t2_schema());
        let pred = db.parse_predicate("t1.id = t2.id", &schema);
        let (left_schema, right_schema) = if swapped {
            (t2_schema(), t1_schema())
        } else {
            (t1_schema(), t2_schema())
        };
        NestedLoopsJoinExec::builder()
            .left(Box::new(MockExec::new(left_rows, left_schema)))
            .right(Box::new(MockExec::new(right_rows, right_schema)))
            .join_type(join_type)
            .predicate(pred)
            .schema(schema)
            .schema_swapped(swapped)
            .build()
    }

    fn run(db: &mut TestDb, join: &mut NestedLoopsJoinExec) -> Vec<Vec<Value>> {
        let mut ctx = db.ctx();
        join.open(&mut ctx).unwrap();
        let out: Vec<_> = std::iter::from_fn(|| join.next(&mut ctx).unwrap())
            .map(|t| t.values)
            .collect();
        join.close(&mut ctx).unwrap();
        out
    }

    #[test]
    fn inner_join_emits_matches_only() {
        let mut db = TestDb::new();
        let mut join = join_exec(&db, JoinType::Inner, false, t1_rows(), t2_rows());
        let rows = run(&mut db, &mut join);
        assert_eq!(
            rows,
            vec![vec![
                Value::Int(1),
                Value::Text("alpha".into()),
                Value::Int(1),
                Value::Text("A".into())
            ]]
        );
    }

    #[test]
    fn null_keys_never_match() {
        let mut db = TestDb::new();
        // Only NULL ids on both sides: the equality is UNKNOWN everywhere.
        let mut join = join_exec(
            &db,
            JoinType::Inner,
            false,
            vec![Tuple::new(vec![Value::Null, Value::Text("l".into())])],
            vec![Tuple::new(vec![Value::Null, Value::Text("9".into())])],
        );
        assert!(run(&mut db, &mut join).is_empty());
    }

    #[test]
    fn cross_join_has_no_predicate_and_no_padding() {
        let mut db = TestDb::new();
        let schema = t1_schema().join(&t2_schema());
        let mut join = NestedLoopsJoinExec::builder()
            .left(Box::new(MockExec::new(
                vec![int_text_tuple(1, "a"), int_text_tuple(2, "b")],
                t1_schema(),
            )))
            .right(Box::new(MockExec::new(
                vec![int_text_tuple(10, "x"), int_text_tuple(20, "y")],
                t2_schema(),
            )))
            .join_type(JoinType::Cross)
            .schema(schema)
            .schema_swapped(false)
            .build();
        let rows = run(&mut db, &mut join);
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn left_outer_pads_unmatched_left_tuples() {
        let mut db = TestDb::new();
        let mut join = join_exec(&db, JoinType::LeftOuter, false, t1_rows(), t2_rows());
        let rows = run(&mut db, &mut join);
        assert_eq!(
            rows,
            vec![
                vec![
                    Value::Int(1),
                    Value::Text("alpha".into()),
                    Value::Int(1),
                    Value::Text("A".into())
                ],
                vec![
                    Value::Int(2),
                    Value::Text("beta".into()),
                    Value::Null,
                    Value::Null
                ],
                vec![
                    Value::Null,
                    Value::Text("lorem".into()),
                    Value::Null,
                    Value::Null
                ],
            ]
        );
    }

    #[test]
    fn swapped_left_outer_restores_column_order() {
        let mut db = TestDb::new();
        // RIGHT OUTER t1/t2 normalised: outer loop over t2 rows, t1
        // materialised, output still t1 ⊕ t2.
        let mut join = join_exec(&db, JoinType::LeftOuter, true, t2_rows(), t1_rows());
        let rows = run(&mut db, &mut join);
        assert_eq!(
            rows,
            vec![
                vec![
                    Value::Int(1),
                    Value::Text("alpha".into()),
                    Value::Int(1),
                    Value::Text("A".into())
                ],
                vec![Value::Null, Value::Null, Value::Int(3), Value::Text("C".into())],
                vec![Value::Null, Value::Null, Value::Null, Value::Text("9".into())],
            ]
        );
    }

    #[test]
    fn full_outer_pads_both_sides() {
        let mut db = TestDb::new();
        let mut join = join_exec(&db, JoinType::FullOuter, false, t1_rows(), t2_rows());
        let rows = run(&mut db, &mut join);
        assert_eq!(
            rows,
            vec![
                // matched pair
                vec![
                    Value::Int(1),
                    Value::Text("alpha".into()),
                    Value::Int(1),
                    Value::Text("A".into())
                ],
                // unmatched left tuples, right side padded
                vec![
                    Value::Int(2),
                    Value::Text("beta".into()),
                    Value::Null,
                    Value::Null
                ],
                vec![
                    Value::Null,
                    Value::Text("lorem".into()),
                    Value::Null,
                    Value::Null
                ],
                // drain phase: unmatched right tuples, left side padded
                vec![Value::Null, Value::Null, Value::Int(3), Value::Text("C".into())],
                vec![Value::Null, Value::Null, Value::Null, Value::Text("9".into())],
            ]
        );
    }

    #[test]
    fn empty_right_side_pads_every_left_tuple() {
        let mut db = TestDb::new();
        let mut join = join_exec(&db, JoinType::LeftOuter, false, t1_rows(), vec![]);
        let rows = run(&mut db, &mut join);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r[2].is_null() && r[3].is_null()));
    }

    #[test]
    fn empty_left_side_of_inner_join_is_empty() {
        let mut db = TestDb::new();
        let mut join = join_exec(&db, JoinType::Inner, false, vec![], t2_rows());
        assert!(run(&mut db, &mut join).is_empty());
    }

    #[test]
    fn reopen_restarts_the_whole_join() {
        let mut db = TestDb::new();
        let mut join = join_exec(&db, JoinType::Inner, false, t1_rows(), t2_rows());
        let first = run(&mut db, &mut join);
        let second = run(&mut db, &mut join);
        assert_eq!(first, second);
    }
}
