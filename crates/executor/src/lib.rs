//! Query executor: pull-based Volcano operators built from plan templates.
//!
//! Each operator implements [`Executor`]: `open` initialises (and may be
//! called again to restart), `next` produces tuples lazily, `close` releases
//! resources and is safe from any post-open state. Operators optionally
//! support marking: `mark` remembers the current position and
//! `reset_to_mark` replays the exact tuple sequence from that point.
//!
//! # Example
//!
//! ```no_run
//! use executor::{ExecutionContext, execute_query};
//! use planner::{PlanContext, PlanNode};
//! use catalog::Catalog;
//! use buffer::FilePager;
//! use std::path::PathBuf;
//!
//! let catalog = Catalog::new();
//! let mut pager = FilePager::new("/tmp/db", 100);
//! let mut plan = PlanNode::file_scan("users");
//! plan.prepare(&PlanContext::new(&catalog)).unwrap();
//!
//! let mut ctx = ExecutionContext::new(&catalog, &mut pager, PathBuf::from("/tmp/db"));
//! let rows = execute_query(&plan, &mut ctx).unwrap();
//! ```

mod builder;
mod filter;
mod join;
mod limit;
mod project;
mod rename;
mod scan;
mod sort;


pub use builder::build_executor;
pub use filter::FilterExec;
pub use join::NestedLoopsJoinExec;
pub use limit::LimitExec;
pub use project::ProjectExec;
pub use rename::RenameExec;
pub use scan::FileScanExec;
pub use sort::SortExec;

use catalog::Catalog;
use common::{DbError, DbResult, Schema, TableId, Tuple};
use planner::{PlanNode, SortKey};
use std::path::PathBuf;
use storage::HeapFile;

/// Pull-based iterator interface for query execution.
pub trait Executor {
    /// Initialise execution state; calling again restarts the stream.
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;

    /// Fetch the next tuple, or `None` when exhausted. A returned tuple is
    /// valid at least until the next call on this operator.
    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>>;

    /// Release resources, recursively closing children. Safe to call from
    /// any state after `open`.
    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()>;

    /// The schema of tuples this operator produces.
    fn schema(&self) -> &Schema;

    /// Whether `mark`/`reset_to_mark` are available.
    fn supports_marking(&self) -> bool {
        false
    }

    /// Remember the current position in the tuple stream.
    fn mark(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Err(DbError::Plan("operator does not support marking".into()))
    }

    /// Restart the stream from the marked position.
    fn reset_to_mark(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Err(DbError::Plan("operator does not support marking".into()))
    }

    /// Truthful ordering advertisement; only sort produces a non-empty one.
    fn results_ordered_by(&self) -> Option<&[SortKey]> {
        None
    }
}

/// Shared execution context passed to all operators.
pub struct ExecutionContext<'a> {
    pub catalog: &'a Catalog,
    pub pager: &'a mut dyn buffer::Pager,
    pub data_dir: PathBuf,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        pager: &'a mut dyn buffer::Pager,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            catalog,
            pager,
            data_dir,
        }
    }

    /// Open the heap file backing a table, for direct record access.
    pub fn heap_table(&mut self, table_id: TableId) -> DbResult<HeapFile> {
        let file_path = self.data_dir.join(storage::table_file_name(table_id.0));
        HeapFile::open(&file_path, table_id.0)
    }
}

/// Execute a prepared plan and collect all result tuples.
///
/// # Errors
///
/// Propagates storage, schema and type errors from the operators; the
/// executor tree is closed before returning an error from `next`.
pub fn execute_query(plan: &PlanNode, ctx: &mut ExecutionContext) -> DbResult<Vec<Tuple>> {
    let mut executor = build_executor(plan, ctx.catalog)?;

    executor.open(ctx)?;

    let mut results = Vec::new();
    loop {
        match executor.next(ctx) {
            Ok(Some(tuple)) => results.push(tuple),
            Ok(None) => break,
            Err(e) => {
                let _ = executor.close(ctx);
                return Err(e);
            }
        }
    }

    executor.close(ctx)?;

    Ok(results)
}
