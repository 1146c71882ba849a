//! Column descriptors and ordered schemas.

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use types::SqlType;

/// A possibly-qualified column reference, e.g. `id` or `users.id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnName {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnName {
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(t) => write!(f, "{}.{}", t, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Descriptor for one column: optional table qualifier, name, type,
/// nullability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub table: Option<String>,
    pub name: String,
    pub ty: SqlType,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            table: None,
            name: name.into(),
            ty,
            nullable: true,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn column_name(&self) -> ColumnName {
        ColumnName {
            table: self.table.clone(),
            name: self.name.clone(),
        }
    }

    fn matches(&self, wanted: &ColumnName) -> bool {
        if !self.name.eq_ignore_ascii_case(&wanted.name) {
            return false;
        }
        match &wanted.table {
            Some(t) => self
                .table
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(t)),
            None => true,
        }
    }
}

/// Ordered sequence of column descriptors. Immutable once produced by
/// `prepare`; joining two schemas concatenates their columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Option<&ColumnInfo> {
        self.columns.get(idx)
    }

    /// Resolve a column reference to its position.
    ///
    /// Qualified references match exactly; unqualified references must be
    /// unique across the schema. Returns `Ok(None)` when nothing matches and
    /// a `Schema` error when an unqualified name is ambiguous.
    pub fn column_index(&self, wanted: &ColumnName) -> DbResult<Option<usize>> {
        let mut found = None;
        for (idx, col) in self.columns.iter().enumerate() {
            if !col.matches(wanted) {
                continue;
            }
            if found.is_some() {
                return Err(DbError::Schema(format!(
                    "ambiguous column '{wanted}' (matches multiple columns)"
                )));
            }
            found = Some(idx);
        }
        Ok(found)
    }

    /// Like [`Schema::column_index`] but absence is an error.
    pub fn find_column(&self, wanted: &ColumnName) -> DbResult<usize> {
        self.column_index(wanted)?
            .ok_or_else(|| DbError::Schema(format!("unknown column '{wanted}'")))
    }

    pub fn contains(&self, wanted: &ColumnName) -> bool {
        matches!(self.column_index(wanted), Ok(Some(_)))
    }

    /// Concatenate two schemas, left columns first. Duplicate unqualified
    /// names are permitted; lookups flag them as ambiguous.
    pub fn join(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema { columns }
    }

    /// Rewrite every column's table qualifier, used by RENAME (`AS alias`).
    pub fn with_qualifier(&self, table: &str) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .map(|c| {
                    let mut c = c.clone();
                    c.table = Some(table.to_string());
                    c
                })
                .collect(),
        }
    }

    /// Column labels for result-set headers (`t.c` when qualified).
    pub fn labels(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.column_name().to_string())
            .collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", c.column_name(), c.ty)?;
        }
        write!(f, ")")
    }
}
