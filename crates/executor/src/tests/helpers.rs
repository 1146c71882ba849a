//! Shared helpers for executor unit tests.

use crate::ExecutionContext;
use buffer::FilePager;
use catalog::{Catalog, TableSchema};
use common::{ColumnInfo, DbResult, Schema, TableId, Tuple};
use expr::{Expr, SelectValue};
use storage::{HeapFile, HeapTable};
use types::{SqlType, Value};

/// Schema of the canonical `t1(id INT, v VARCHAR)` test table.
pub fn t1_schema() -> Schema {
    Schema::new(vec![
        ColumnInfo::new("id", SqlType::Int).with_table("t1"),
        ColumnInfo::new("v", SqlType::Varchar(20)).with_table("t1"),
    ])
}

/// Schema of the canonical `t2(id INT, w VARCHAR)` test table.
pub fn t2_schema() -> Schema {
    Schema::new(vec![
        ColumnInfo::new("id", SqlType::Int).with_table("t2"),
        ColumnInfo::new("w", SqlType::Varchar(20)).with_table("t2"),
    ])
}

pub fn int_text_tuple(id: i32, text: &str) -> Tuple {
    Tuple::new(vec![Value::Int(id), Value::Text(text.into())])
}

/// Isolated catalog + pager + data directory for one test.
pub struct TestDb {
    pub catalog: Catalog,
    pager: FilePager,
    dir: tempfile::TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            catalog: Catalog::new(),
            pager: FilePager::new(dir.path(), 16),
            dir,
        }
    }

    /// A test database with `t1(id INT, v VARCHAR(20))` registered.
    pub fn with_t1() -> Self {
        let mut db = Self::new();
        let schema = TableSchema::try_new(vec![
            ColumnInfo::new("id", SqlType::Int),
            ColumnInfo::new("v", SqlType::Varchar(20)),
        ])
        .unwrap();
        db.catalog.create_table("t1", schema).unwrap();
        db
    }

    pub fn ctx(&mut self) -> ExecutionContext<'_> {
        ExecutionContext::new(&self.catalog, &mut self.pager, self.dir.path().into())
    }

    pub fn table_id(&self, name: &str) -> TableId {
        self.catalog.table(name).unwrap().id
    }

    /// The runtime schema a scan of `name` produces.
    pub fn scan_schema(&self, name: &str) -> Schema {
        let meta = self.catalog.table(name).unwrap();
        meta.schema.to_schema(&meta.name)
    }

    /// Parse a WHERE fragment and sanity-check it against a schema.
    pub fn parse_predicate(&self, fragment: &str, schema: &Schema) -> Expr {
        let sql = format!("SELECT * FROM t1 WHERE {fragment}");
        let expr = match parser::parse_sql(&sql).unwrap().remove(0) {
            parser::Statement::Select(select) => select.where_clause.unwrap(),
            other => panic!("expected SELECT, got {other:?}"),
        };
        expr.column_info(schema).unwrap();
        expr
    }

    /// Parse the select list of a full SELECT statement.
    pub fn parse_select_values(&self, sql: &str) -> Vec<SelectValue> {
        match parser::parse_sql(sql).unwrap().remove(0) {
            parser::Statement::Select(select) => select.values,
            other => panic!("expected SELECT, got {other:?}"),
        }
    }
}

/// Insert rows directly through the heap file backing `table`.
pub fn insert_rows(db: &mut TestDb, table: &str, rows: Vec<Tuple>) {
    let table_id = db.table_id(table);
    let path = db.dir.path().join(storage::table_file_name(table_id.0));
    let mut heap = HeapFile::open(&path, table_id.0).unwrap();
    for row in rows {
        heap.insert(&row).unwrap();
    }
}

/// In-memory executor over fixed rows, with marking support; used to drive
/// operators without touching storage.
pub struct MockExec {
    rows: Vec<Tuple>,
    schema: Schema,
    cursor: usize,
    marked: Option<usize>,
}

impl MockExec {
    pub fn new(rows: Vec<Tuple>, schema: Schema) -> Self {
        Self {
            rows,
            schema,
            cursor: 0,
            marked: None,
        }
    }
}

impl crate::Executor for MockExec {
    fn open(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        self.cursor = 0;
        self.marked = None;
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> DbResult<Option<Tuple>> {
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let row = self.rows[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn close(&mut self, _ctx: &mut ExecutionContext) -> DbResult<()> {
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
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
}
