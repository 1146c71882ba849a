//! Runtime binding of schemas to tuples for column resolution.

use common::{ColumnName, DbError, DbResult, Schema, Tuple};
use types::Value;

/// An ordered list of `(schema, tuple)` bindings.
///
/// Column lookup walks bindings in insertion order; the first binding whose
/// schema contains the name wins. An environment is scoped to a single
/// evaluation and holds no owned data.
#[derive(Default)]
pub struct Environment<'a> {
    bindings: Vec<(&'a Schema, &'a Tuple)>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a single pair without constructing an environment by hand.
    pub fn single(schema: &'a Schema, tuple: &'a Tuple) -> Self {
        let mut env = Self::new();
        env.add_tuple(schema, tuple);
        env
    }

    pub fn add_tuple(&mut self, schema: &'a Schema, tuple: &'a Tuple) {
        debug_assert_eq!(
            schema.column_count(),
            tuple.column_count(),
            "tuple arity must match its schema"
        );
        self.bindings.push((schema, tuple));
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Resolve a column reference to its current value.
    ///
    /// Ambiguity within one schema is a `Schema` error; a name missing from
    /// every binding is too.
    pub fn lookup(&self, name: &ColumnName) -> DbResult<&'a Value> {
        for &(schema, tuple) in &self.bindings {
            if let Some(idx) = schema.column_index(name)? {
                return tuple.get(idx).ok_or_else(|| {
                    DbError::Schema(format!(
                        "column '{name}' resolved to index {idx} beyond tuple arity {}",
                        tuple.column_count()
                    ))
                });
            }
        }
        Err(DbError::Schema(format!("unknown column '{name}'")))
    }
}
