//! File scan: the leaf operator streaming a table's tuples.

use crate::{ExecutionContext, Executor};
use common::{DbResult, PageId, Schema, TableId, Tuple};
use expr::{Environment, Expr};
use tracing::trace;

/// Streams all tuples of a table through the buffer pool, applying an
/// optional pushed-down predicate.
///
/// Pages are pinned while tuples are decoded out of them. Marking remembers
/// the scan position and holds an extra pin on the marked page until the
/// mark is consumed or the scan closes.
pub struct FileScanExec {
    table_id: TableId,
    schema: Schema,
    predicate: Option<Expr>,

    // Cursor: next (page, slot) to examine.
    page: u64,
    slot: u16,
    num_pages: u64,
    marked: Option<(u64, u16)>,
    pinned_mark_page: Option<PageId>,
}

impl FileScanExec {
    pub fn new(table_id: TableId, schema: Schema, predicate: Option<Expr>) -> Self {
        Self {
            table_id,
            schema,
            predicate,
            page: 0,
            slot: 0,
            num_pages: 0,
            marked: None,
            pinned_mark_page: None,
        }
    }

    fn release_mark_pin(&mut self, ctx: &mut ExecutionContext) {
        if let Some(pid) = self.pinned_mark_page.take() {
            ctx.pager.unpin(self.table_id, pid);
        }
    }

    /// Fetch the next live tuple at or after the cursor, advancing it.
    fn fetch_next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        while self.page < self.num_pages {
            let pid = PageId(self.page);
            ctx.pager.pin(self.table_id, pid);

            let result = (|| -> DbResult<Option<Tuple>> {
                let page = ctx.pager.fetch_page(self.table_id, pid)?;
                let num_slots = storage::page_slot_count(page)?;
                while self.slot < num_slots {
                    let slot = self.slot;
                    self.slot += 1;
                    if let Some(tuple) = storage::read_page_tuple(page, pid, slot)? {
                        return Ok(Some(tuple));
                    }
                }
                Ok(None)
            })();

            ctx.pager.unpin(self.table_id, pid);

            match result? {
                Some(tuple) => return Ok(Some(tuple)),
                None => {
                    self.page += 1;
                    self.slot = 0;
                }
            }
        }
        Ok(None)
    }
}

impl Executor for FileScanExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.release_mark_pin(ctx);
        self.page = 0;
        self.slot = 0;
        self.marked = None;
        self.num_pages = ctx.pager.num_pages(self.table_id)?;
        trace!(table = self.table_id.0, pages = self.num_pages, "scan open");
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        loop {
            let Some(tuple) = self.fetch_next(ctx)? else {
                return Ok(None);
            };

            let passes = match &self.predicate {
                None => true,
                Some(pred) => {
                    let env = Environment::single(&self.schema, &tuple);
                    pred.evaluate_predicate(&env)?
                }
            };
            if passes {
                return Ok(Some(tuple));
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.release_mark_pin(ctx);
        self.marked = None;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn supports_marking(&self) -> bool {
        true
    }

    fn mark(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        self.release_mark_pin(ctx);
        self.marked = Some((self.page, self.slot));
        if self.page < self.num_pages {
            let pid = PageId(self.page);
            ctx.pager.pin(self.table_id, pid);
            self.pinned_mark_page = Some(pid);
        }
        Ok(())
    }

    fn reset_to_mark(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let (page, slot) = self
            .marked
            .ok_or_else(|| common::DbError::Plan("reset without mark".into()))?;
        self.page = page;
        self.slot = slot;
        self.release_mark_pin(ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{TestDb, insert_rows, int_text_tuple};
    use types::Value;

    #[test]
    fn scan_empty_table_is_exhausted_immediately() {
        let mut db = TestDb::with_t1();
        let schema = db.scan_schema("t1");
        let table_id = db.table_id("t1");
        let mut ctx = db.ctx();

        let mut scan = FileScanExec::new(table_id, schema, None);
        scan.open(&mut ctx).unwrap();
        assert!(scan.next(&mut ctx).unwrap().is_none());
        scan.close(&mut ctx).unwrap();
    }

    #[test]
    fn scan_streams_all_rows_in_order() {
        let mut db = TestDb::with_t1();
        insert_rows(
            &mut db,
            "t1",
            vec![int_text_tuple(1, "alpha"), int_text_tuple(2, "beta")],
        );
        let schema = db.scan_schema("t1");
        let table_id = db.table_id("t1");
        let mut ctx = db.ctx();

        let mut scan = FileScanExec::new(table_id, schema, None);
        scan.open(&mut ctx).unwrap();
        assert_eq!(
            scan.next(&mut ctx).unwrap().unwrap().values[0],
            Value::Int(1)
        );
        assert_eq!(
            scan.next(&mut ctx).unwrap().unwrap().values[0],
            Value::Int(2)
        );
        assert!(scan.next(&mut ctx).unwrap().is_none());
        scan.close(&mut ctx).unwrap();
    }

    #[test]
    fn scan_tuples_are_page_backed() {
        let mut db = TestDb::with_t1();
        insert_rows(&mut db, "t1", vec![int_text_tuple(1, "alpha")]);
        let schema = db.scan_schema("t1");
        let table_id = db.table_id("t1");
        let mut ctx = db.ctx();

        let mut scan = FileScanExec::new(table_id, schema, None);
        scan.open(&mut ctx).unwrap();
        let tuple = scan.next(&mut ctx).unwrap().unwrap();
        assert!(!tuple.is_cacheable());
        assert!(tuple.rid().is_some());
        scan.close(&mut ctx).unwrap();
    }

    #[test]
    fn pushed_predicate_filters_rows() {
        let mut db = TestDb::with_t1();
        insert_rows(
            &mut db,
            "t1",
            vec![
                int_text_tuple(1, "alpha"),
                int_text_tuple(2, "beta"),
                int_text_tuple(3, "gamma"),
            ],
        );
        let schema = db.scan_schema("t1");
        let table_id = db.table_id("t1");
        let pred = db.parse_predicate("id >= 2", &schema);
        let mut ctx = db.ctx();

        let mut scan = FileScanExec::new(table_id, schema, Some(pred));
        scan.open(&mut ctx).unwrap();
        assert_eq!(
            scan.next(&mut ctx).unwrap().unwrap().values[0],
            Value::Int(2)
        );
        assert_eq!(
            scan.next(&mut ctx).unwrap().unwrap().values[0],
            Value::Int(3)
        );
        assert!(scan.next(&mut ctx).unwrap().is_none());
        scan.close(&mut ctx).unwrap();
    }

    #[test]
    fn reopen_restarts_from_the_beginning() {
        let mut db = TestDb::with_t1();
        insert_rows(
            &mut db,
            "t1",
            vec![int_text_tuple(1, "alpha"), int_text_tuple(2, "beta")],
        );
        let schema = db.scan_schema("t1");
        let table_id = db.table_id("t1");
        let mut ctx = db.ctx();

        let mut scan = FileScanExec::new(table_id, schema, None);
        scan.open(&mut ctx).unwrap();
        scan.next(&mut ctx).unwrap().unwrap();

        scan.open(&mut ctx).unwrap();
        assert_eq!(
            scan.next(&mut ctx).unwrap().unwrap().values[0],
            Value::Int(1)
        );
        scan.close(&mut ctx).unwrap();
    }

    #[test]
    fn mark_and_reset_replay_the_same_suffix() {
        let mut db = TestDb::with_t1();
        insert_rows(
            &mut db,
            "t1",
            vec![
                int_text_tuple(1, "a"),
                int_text_tuple(2, "b"),
                int_text_tuple(3, "c"),
            ],
        );
        let schema = db.scan_schema("t1");
        let table_id = db.table_id("t1");
        let mut ctx = db.ctx();

        let mut scan = FileScanExec::new(table_id, schema, None);
        assert!(scan.supports_marking());

        scan.open(&mut ctx).unwrap();
        scan.next(&mut ctx).unwrap().unwrap(); // consume row 1
        scan.mark(&mut ctx).unwrap();

        let first: Vec<_> = std::iter::from_fn(|| scan.next(&mut ctx).unwrap()).collect();
        scan.reset_to_mark(&mut ctx).unwrap();
        let second: Vec<_> = std::iter::from_fn(|| scan.next(&mut ctx).unwrap()).collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        scan.close(&mut ctx).unwrap();
    }
}
