use expr::{Expr, SelectClause};
use types::SqlType;

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
        primary_key: Option<Vec<String>>,
        /// UNIQUE table constraints, kept as candidate keys.
        unique_keys: Vec<Vec<String>>,
    },
    DropTable {
        name: String,
    },
    CreateIndex {
        name: String,
        table: String,
        columns: Vec<String>,
    },
    DropIndex {
        name: String,
    },
    Insert {
        table: String,
        source: InsertSource,
    },
    Select(SelectClause),
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        selection: Option<Expr>,
    },
    Delete {
        table: String,
        selection: Option<Expr>,
    },
    Explain {
        query: Box<Statement>,
        analyze: bool,
    },
    Analyze {
        table: String,
    },
    /// Transaction verbs are recognised so the shell can refuse them
    /// politely; the engine itself is non-transactional.
    Begin,
    Commit,
    Rollback,
}

/// Row source of an INSERT: literal VALUES rows or a SELECT.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<SelectClause>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: SqlType,
}
