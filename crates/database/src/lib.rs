//! Session shell: executes parsed statements against one database
//! directory.
//!
//! `Database` owns the catalog, the buffer pool, and the data directory.
//! SELECT and EXPLAIN run through the planner and executor; DML goes
//! straight to the heap files (invalidating cached pages afterwards);
//! ANALYZE refreshes the statistics the cost model reads. Execution is
//! single-threaded: one statement at a time pulls tuples from a plan root.

mod analyze;
mod subquery;

use buffer::{FilePager, Pager};
use catalog::{Catalog, TableMeta, TableSchema};
use common::{
    ColumnInfo, Config, DbError, DbResult, RecordBatch, RecordId, Schema, TableId, Tuple,
};
use executor::{ExecutionContext, execute_query};
use expr::{Environment, Expr, SelectClause};
use parser::{InsertSource, Statement, parse_sql};
use planner::{PlanContext, Planner, explain_plan};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use storage::{HeapFile, HeapTable};
use tracing::{debug, info};

/// Outcome of one statement.
#[derive(Clone, Debug)]
pub enum CommandOutcome {
    /// SELECT result rows with their column labels.
    Rows(RecordBatch),
    /// Rows affected by INSERT/UPDATE/DELETE.
    Count { affected: u64 },
    /// EXPLAIN output.
    Explain(String),
    /// DDL and other informational results.
    Message(String),
}

/// Summary of one executed command: outcome plus elapsed time.
#[derive(Clone, Debug)]
pub struct CommandResult {
    pub outcome: CommandOutcome,
    pub elapsed: Duration,
}

impl CommandResult {
    /// Number of rows this command produced or affected.
    pub fn row_count(&self) -> u64 {
        match &self.outcome {
            CommandOutcome::Rows(batch) => batch.rows.len() as u64,
            CommandOutcome::Count { affected } => *affected,
            _ => 0,
        }
    }
}

/// A single-user database session over one data directory.
pub struct Database {
    catalog: Catalog,
    pager: FilePager,
    data_dir: PathBuf,
    catalog_path: PathBuf,
}

impl Database {
    /// Open (or create) a database under the configured data directory.
    pub fn open(config: Config) -> DbResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let catalog_path = config.data_dir.join("catalog.json");
        let catalog = Catalog::load(&catalog_path)?;
        info!(data_dir = %config.data_dir.display(), "database opened");
        Ok(Self {
            catalog,
            pager: FilePager::new(&config.data_dir, config.buffer_pool_pages),
            data_dir: config.data_dir,
            catalog_path,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parse and execute a script, stopping at the first error.
    pub fn execute(&mut self, sql: &str) -> DbResult<Vec<CommandResult>> {
        let statements = parse_sql(sql)?;
        let mut results = Vec::with_capacity(statements.len());
        for stmt in statements {
            results.push(self.execute_statement(stmt)?);
        }
        Ok(results)
    }

    /// Execute one parsed statement.
    pub fn execute_statement(&mut self, stmt: Statement) -> DbResult<CommandResult> {
        let start = Instant::now();
        let outcome = self.dispatch(stmt)?;
        let elapsed = start.elapsed();
        debug!(?elapsed, "statement finished");
        Ok(CommandResult { outcome, elapsed })
    }

    fn dispatch(&mut self, stmt: Statement) -> DbResult<CommandOutcome> {
        match stmt {
            Statement::CreateTable {
                name,
                columns,
                primary_key,
                unique_keys,
            } => self.create_table(name, columns, primary_key, unique_keys),
            Statement::DropTable { name } => self.drop_table(&name),
            Statement::CreateIndex {
                name,
                table,
                columns,
            } => {
                let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
                self.catalog
                    .create_index(&table, &name, &cols, catalog::IndexKind::BTree)?;
                self.save_catalog()?;
                Ok(CommandOutcome::Message(format!(
                    "index '{name}' created on '{table}'"
                )))
            }
            Statement::DropIndex { name } => self.drop_index(&name),
            Statement::Insert { table, source } => self.insert(&table, source),
            Statement::Update {
                table,
                assignments,
                selection,
            } => self.update(&table, assignments, selection),
            Statement::Delete { table, selection } => self.delete(&table, selection),
            Statement::Select(select) => self.select(select),
            Statement::Explain { query, analyze } => self.explain(*query, analyze),
            Statement::Analyze { table } => self.analyze(&table),
            Statement::Begin | Statement::Commit | Statement::Rollback => {
                Ok(CommandOutcome::Message(
                    "transactions are not supported; statement ignored".into(),
                ))
            }
        }
    }

    // DDL

    fn create_table(
        &mut self,
        name: String,
        columns: Vec<parser::ColumnDef>,
        primary_key: Option<Vec<String>>,
        unique_keys: Vec<Vec<String>>,
    ) -> DbResult<CommandOutcome> {
        let infos: Vec<ColumnInfo> = columns
            .into_iter()
            .map(|c| ColumnInfo::new(c.name, c.ty))
            .collect();
        let mut schema = TableSchema::try_new(infos)?;

        if let Some(pk_names) = primary_key {
            let ordinals = pk_names
                .iter()
                .map(|n| {
                    schema.column_index(n).ok_or_else(|| {
                        DbError::Catalog(format!("unknown PRIMARY KEY column '{n}'"))
                    })
                })
                .collect::<DbResult<Vec<_>>>()?;
            schema = schema.with_primary_key(ordinals)?;
        }

        for key in unique_keys {
            let ordinals = key
                .iter()
                .map(|n| {
                    schema.column_index(n).ok_or_else(|| {
                        DbError::Catalog(format!("unknown UNIQUE column '{n}'"))
                    })
                })
                .collect::<DbResult<Vec<_>>>()?;
            schema.candidate_keys.push(ordinals);
        }

        self.catalog.create_table(&name, schema)?;
        self.save_catalog()?;
        Ok(CommandOutcome::Message(format!("table '{name}' created")))
    }

    fn drop_table(&mut self, name: &str) -> DbResult<CommandOutcome> {
        let table_id = self.catalog.table(name)?.id;
        self.catalog.drop_table(name)?;
        self.pager.invalidate(table_id);
        let path = self.heap_path(table_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        self.save_catalog()?;
        Ok(CommandOutcome::Message(format!("table '{name}' dropped")))
    }

    fn drop_index(&mut self, index_name: &str) -> DbResult<CommandOutcome> {
        let owner = self
            .catalog
            .tables()
            .find(|t| t.has_index(index_name))
            .map(|t| t.name.clone())
            .ok_or_else(|| DbError::Catalog(format!("unknown index '{index_name}'")))?;
        self.catalog.drop_index(&owner, index_name)?;
        self.save_catalog()?;
        Ok(CommandOutcome::Message(format!(
            "index '{index_name}' dropped"
        )))
    }

    // DML

    fn insert(&mut self, table: &str, source: InsertSource) -> DbResult<CommandOutcome> {
        let rows = match source {
            InsertSource::Values(rows) => {
                let env = Environment::new();
                rows.into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|e| e.evaluate(&env))
                            .collect::<DbResult<Vec<_>>>()
                            .map(Tuple::new)
                    })
                    .collect::<DbResult<Vec<_>>>()?
            }
            InsertSource::Select(select) => {
                let (_, rows) = self.run_select(*select)?;
                rows
            }
        };

        let meta = self.catalog.table(table)?;
        let table_id = meta.id;
        validate_rows(meta, &rows)?;

        let mut heap = self.open_heap(table_id)?;
        let mut affected = 0u64;
        for row in &rows {
            heap.insert(row)?;
            affected += 1;
        }
        drop(heap);
        self.pager.invalidate(table_id);

        Ok(CommandOutcome::Count { affected })
    }

    fn update(
        &mut self,
        table: &str,
        assignments: Vec<(String, Expr)>,
        selection: Option<Expr>,
    ) -> DbResult<CommandOutcome> {
        let meta = self.catalog.table(table)?;
        let table_id = meta.id;
        let schema = meta.schema.to_schema(&meta.name);

        let resolved: Vec<(usize, Expr)> = assignments
            .into_iter()
            .map(|(name, e)| {
                let ordinal = meta.schema.column_index(&name).ok_or_else(|| {
                    DbError::Schema(format!("unknown column '{name}' in UPDATE"))
                })?;
                Ok((ordinal, e))
            })
            .collect::<DbResult<Vec<_>>>()?;

        // Collect first, then apply: updates relocate tuples, and a scan
        // over a file being rewritten could visit a moved tuple twice.
        let mut heap = self.open_heap(table_id)?;
        let mut pending: Vec<(RecordId, Tuple)> = Vec::new();
        let mut cursor = heap.first_tuple()?;
        while let Some(tuple) = cursor {
            let rid = tuple.rid().expect("heap tuples carry their rid");
            if matches_selection(&selection, &schema, &tuple)? {
                let env = Environment::single(&schema, &tuple);
                let mut values = tuple.values.clone();
                for (ordinal, e) in &resolved {
                    values[*ordinal] = e.evaluate(&env)?;
                }
                pending.push((rid, Tuple::new(values)));
            }
            cursor = heap.next_tuple(rid)?;
        }

        let affected = pending.len() as u64;
        for (rid, row) in pending {
            heap.update(rid, &row)?;
        }
        drop(heap);
        self.pager.invalidate(table_id);

        Ok(CommandOutcome::Count { affected })
    }

    fn delete(&mut self, table: &str, selection: Option<Expr>) -> DbResult<CommandOutcome> {
        let meta = self.catalog.table(table)?;
        let table_id = meta.id;
        let schema = meta.schema.to_schema(&meta.name);

        let mut heap = self.open_heap(table_id)?;
        let mut victims: Vec<RecordId> = Vec::new();
        let mut cursor = heap.first_tuple()?;
        while let Some(tuple) = cursor {
            let rid = tuple.rid().expect("heap tuples carry their rid");
            if matches_selection(&selection, &schema, &tuple)? {
                victims.push(rid);
            }
            cursor = heap.next_tuple(rid)?;
        }

        let affected = victims.len() as u64;
        for rid in victims {
            heap.delete(rid)?;
        }
        drop(heap);
        self.pager.invalidate(table_id);

        Ok(CommandOutcome::Count { affected })
    }

    // Queries

    fn select(&mut self, select: SelectClause) -> DbResult<CommandOutcome> {
        let (schema, rows) = self.run_select(select)?;
        Ok(CommandOutcome::Rows(RecordBatch {
            columns: schema.labels(),
            rows,
        }))
    }

    fn explain(&mut self, query: Statement, analyze: bool) -> DbResult<CommandOutcome> {
        let Statement::Select(mut select) = query else {
            return Err(DbError::Plan("EXPLAIN supports SELECT only".into()));
        };
        self.materialize_subqueries(&mut select)?;
        let plan = Planner::plan_select(&select, &PlanContext::new(&self.catalog))?;
        let mut text = explain_plan(&plan);

        if analyze {
            let start = Instant::now();
            let mut ctx = ExecutionContext::new(&self.catalog, &mut self.pager, self.data_dir.clone());
            let rows = execute_query(&plan, &mut ctx)?;
            text.push_str(&format!(
                "rows: {}  elapsed: {:.3?}\n",
                rows.len(),
                start.elapsed()
            ));
        }

        Ok(CommandOutcome::Explain(text))
    }

    /// Plan and execute a SELECT, materialising uncorrelated subqueries in
    /// its expressions first.
    fn run_select(&mut self, mut select: SelectClause) -> DbResult<(Schema, Vec<Tuple>)> {
        self.materialize_subqueries(&mut select)?;
        let plan = Planner::plan_select(&select, &PlanContext::new(&self.catalog))?;
        let schema = plan.schema()?.clone();
        let mut ctx = ExecutionContext::new(&self.catalog, &mut self.pager, self.data_dir.clone());
        let rows = execute_query(&plan, &mut ctx)?;
        Ok((schema, rows))
    }

    fn materialize_subqueries(&mut self, select: &mut SelectClause) -> DbResult<()> {
        // The closure re-enters `run_select`, which materialises nested
        // subqueries of its own argument first.
        let mut this = self;
        subquery::materialize_select(select, &mut |q: &SelectClause| {
            this.run_select(q.clone())
        })
    }

    fn analyze(&mut self, table: &str) -> DbResult<CommandOutcome> {
        let meta = self.catalog.table(table)?;
        let table_id = meta.id;
        let column_count = meta.schema.column_count();

        let mut heap = self.open_heap(table_id)?;
        let stats = analyze::collect_stats(&mut heap, column_count)?;
        drop(heap);

        let summary = format!(
            "analyzed '{table}': {} tuples over {} pages",
            stats.num_tuples, stats.num_pages
        );
        self.catalog.update_stats(table, stats)?;
        self.save_catalog()?;
        Ok(CommandOutcome::Message(summary))
    }

    // Helpers

    fn heap_path(&self, table_id: TableId) -> PathBuf {
        self.data_dir.join(storage::table_file_name(table_id.0))
    }

    fn open_heap(&self, table_id: TableId) -> DbResult<HeapFile> {
        HeapFile::open(&self.heap_path(table_id), table_id.0)
    }

    fn save_catalog(&self) -> DbResult<()> {
        self.catalog.save(&self.catalog_path)
    }
}

fn matches_selection(
    selection: &Option<Expr>,
    schema: &Schema,
    tuple: &Tuple,
) -> DbResult<bool> {
    match selection {
        None => Ok(true),
        Some(pred) => {
            let env = Environment::single(schema, tuple);
            pred.evaluate_predicate(&env)
        }
    }
}

/// Arity and NOT NULL checks for incoming rows.
fn validate_rows(meta: &TableMeta, rows: &[Tuple]) -> DbResult<()> {
    let columns = meta.schema.columns();
    for row in rows {
        if row.column_count() != columns.len() {
            return Err(DbError::Schema(format!(
                "table '{}' expects {} values, got {}",
                meta.name,
                columns.len(),
                row.column_count()
            )));
        }
        for (value, col) in row.values.iter().zip(columns) {
            if value.is_null() && !col.nullable {
                return Err(DbError::Type(format!(
                    "NULL value in non-nullable column '{}'",
                    col.name
                )));
            }
        }
    }
    Ok(())
}
