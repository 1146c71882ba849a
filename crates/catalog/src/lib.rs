use std::{fs, path::Path};

use ahash::RandomState;
use common::{ColumnInfo, DbError, DbResult, Schema, TableId};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use types::Value;
use uuid::Uuid;


type Map<K, V> = HashMap<K, V, RandomState>;

/// Unique identifier for an index definition stored in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u64);

/// Persistent catalog that stores table schemas, index descriptors, and
/// table statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    tables: Vec<TableMeta>,
    next_table_id: u64,
    next_index_id: u64,
    #[serde(skip)]
    #[serde(default)]
    table_name_index: Map<String, usize>,
    #[serde(skip)]
    #[serde(default)]
    table_id_index: Map<TableId, usize>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        let mut catalog = Self {
            tables: Vec::new(),
            next_table_id: 1,
            next_index_id: 1,
            table_name_index: Map::default(),
            table_id_index: Map::default(),
        };
        catalog.rebuild_indexes();
        catalog
    }

    /// Load a catalog from disk, returning an empty catalog if the file does
    /// not exist.
    pub fn load(path: &Path) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)?;
        let mut catalog: Catalog = serde_json::from_str(&data)
            .map_err(|err| DbError::Catalog(format!("invalid catalog file: {err}")))?;
        catalog.rebuild_indexes();
        Ok(catalog)
    }

    /// Persist the catalog contents as pretty JSON.
    pub fn save(&self, path: &Path) -> DbResult<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| DbError::Catalog(format!("serialize failed: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Returns an immutable reference to a table by name.
    pub fn table(&self, name: &str) -> DbResult<&TableMeta> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))?;
        self.tables
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))
    }

    /// Returns an immutable reference to a table by identifier.
    pub fn table_by_id(&self, id: TableId) -> DbResult<&TableMeta> {
        let idx = self
            .table_id_index
            .get(&id)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table id {}", id.0)))?;
        self.tables
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("unknown table id {}", id.0)))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table_name_index.contains_key(name)
    }

    /// Create a new table with the provided schema, returning its identifier.
    pub fn create_table(&mut self, name: &str, schema: TableSchema) -> DbResult<TableId> {
        if self.table_name_index.contains_key(name) {
            return Err(DbError::Catalog(format!("table '{name}' already exists")));
        }
        let table_id = TableId(self.next_table_id);
        self.next_table_id += 1;
        let table = TableMeta::new(table_id, name.to_string(), schema);
        self.tables.push(table);
        self.rebuild_indexes();
        Ok(table_id)
    }

    /// Remove a table and its associated indexes.
    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        let idx = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))?;
        self.tables.remove(idx);
        self.rebuild_indexes();
        Ok(())
    }

    /// Register an index descriptor over the given table columns, returning
    /// its identifier. Descriptors are metadata only; the engine never reads
    /// index structures.
    pub fn create_index(
        &mut self,
        table_name: &str,
        index_name: &str,
        columns: &[&str],
        kind: IndexKind,
    ) -> DbResult<IndexId> {
        if columns.is_empty() {
            return Err(DbError::Catalog(
                "index must reference at least one column".into(),
            ));
        }
        let resolved = {
            let table = self.table(table_name)?;
            let mut resolved = Vec::with_capacity(columns.len());
            for name in columns {
                let ordinal = table.schema.column_index(name).ok_or_else(|| {
                    DbError::Catalog(format!("unknown column '{name}' on table '{table_name}'"))
                })?;
                resolved.push(ordinal);
            }
            resolved
        };
        let index_id = IndexId(self.next_index_id);
        self.next_index_id += 1;
        let table = self.table_mut(table_name)?;
        table.add_index(IndexMeta {
            id: index_id,
            name: index_name.to_string(),
            columns: resolved,
            kind,
            storage: StorageDescriptor::new(),
        })?;
        Ok(index_id)
    }

    /// Drop an index attached to a table.
    pub fn drop_index(&mut self, table_name: &str, index_name: &str) -> DbResult<()> {
        let table = self.table_mut(table_name)?;
        table.remove_index(index_name)
    }

    /// Replace the statistics for a table, as done by ANALYZE.
    pub fn update_stats(&mut self, table_name: &str, stats: TableStats) -> DbResult<()> {
        let table = self.table_mut(table_name)?;
        table.stats = stats;
        Ok(())
    }

    /// Immutable iterator over all tables.
    pub fn tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.iter()
    }

    pub fn table_mut(&mut self, name: &str) -> DbResult<&mut TableMeta> {
        let id = self
            .table_name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))?;
        self.tables
            .get_mut(id)
            .ok_or_else(|| DbError::Catalog(format!("unknown table '{name}'")))
    }

    fn rebuild_indexes(&mut self) {
        self.table_name_index.clear();
        self.table_id_index.clear();
        for (idx, table) in self.tables.iter_mut().enumerate() {
            self.table_name_index.insert(table.name.clone(), idx);
            self.table_id_index.insert(table.id, idx);
            table.rebuild_index_lookup();
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata describing a registered table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: TableId,
    pub name: String,
    pub schema: TableSchema,
    pub storage: StorageDescriptor,
    pub indexes: Vec<IndexMeta>,
    pub stats: TableStats,
    #[serde(skip)]
    #[serde(default)]
    index_name_lookup: Map<String, usize>,
    #[serde(skip)]
    #[serde(default)]
    index_id_lookup: Map<IndexId, usize>,
}

impl TableMeta {
    fn new(id: TableId, name: String, schema: TableSchema) -> Self {
        let mut table = Self {
            id,
            name,
            schema,
            storage: StorageDescriptor::new(),
            indexes: Vec::new(),
            stats: TableStats::default(),
            index_name_lookup: Map::default(),
            index_id_lookup: Map::default(),
        };
        table.rebuild_index_lookup();
        table
    }

    fn add_index(&mut self, index: IndexMeta) -> DbResult<()> {
        if self.index_name_lookup.contains_key(&index.name) {
            return Err(DbError::Catalog(format!(
                "index '{}' already exists on table '{}'",
                index.name, self.name
            )));
        }
        self.indexes.push(index);
        self.rebuild_index_lookup();
        Ok(())
    }

    fn remove_index(&mut self, index_name: &str) -> DbResult<()> {
        let idx = self
            .index_name_lookup
            .get(index_name)
            .copied()
            .ok_or_else(|| {
                DbError::Catalog(format!(
                    "index '{index_name}' does not exist on table '{}'",
                    self.name
                ))
            })?;
        self.indexes.remove(idx);
        self.rebuild_index_lookup();
        Ok(())
    }

    /// Lookup an index by name.
    pub fn index(&self, name: &str) -> DbResult<&IndexMeta> {
        let idx = self.index_name_lookup.get(name).copied().ok_or_else(|| {
            DbError::Catalog(format!(
                "index '{name}' does not exist on table '{}'",
                self.name
            ))
        })?;
        self.indexes
            .get(idx)
            .ok_or_else(|| DbError::Catalog(format!("index '{name}' missing on '{}'", self.name)))
    }

    /// Returns true if an index with the provided name exists.
    pub fn has_index(&self, index_name: &str) -> bool {
        self.index_name_lookup.contains_key(index_name)
    }

    /// Returns all indexes defined on this table.
    pub fn indexes(&self) -> &[IndexMeta] {
        &self.indexes
    }

    fn rebuild_index_lookup(&mut self) {
        self.index_name_lookup.clear();
        self.index_id_lookup.clear();
        for (idx, index) in self.indexes.iter().enumerate() {
            self.index_name_lookup.insert(index.name.clone(), idx);
            self.index_id_lookup.insert(index.id, idx);
        }
    }
}

/// Column layout and key constraints for a table.
///
/// Extends the runtime `Schema` with primary key, candidate keys, foreign
/// keys and lookup structures. Keys are stored as column ordinals.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TableSchema {
    columns: Vec<ColumnInfo>,
    pub primary_key: Option<Vec<usize>>,
    pub candidate_keys: Vec<Vec<usize>>,
    pub foreign_keys: Vec<ForeignKey>,
    name_to_ordinal: Map<String, usize>,
}

impl TableSchema {
    pub fn try_new(columns: Vec<ColumnInfo>) -> DbResult<Self> {
        if columns.is_empty() {
            return Err(DbError::Catalog(
                "table must contain at least one column".into(),
            ));
        }
        if columns.len() > u16::MAX as usize {
            return Err(DbError::Catalog(
                "too many columns for a single table".into(),
            ));
        }
        let mut name_to_ordinal = Map::default();
        for (idx, column) in columns.iter().enumerate() {
            if name_to_ordinal.insert(column.name.clone(), idx).is_some() {
                return Err(DbError::Catalog(format!(
                    "duplicate column '{}' found while building schema",
                    column.name
                )));
            }
        }
        Ok(Self {
            columns,
            primary_key: None,
            candidate_keys: Vec::new(),
            foreign_keys: Vec::new(),
            name_to_ordinal,
        })
    }

    /// Declare the primary key by column ordinals; key columns become
    /// non-nullable.
    pub fn with_primary_key(mut self, key: Vec<usize>) -> DbResult<Self> {
        for &ordinal in &key {
            let col = self.columns.get_mut(ordinal).ok_or_else(|| {
                DbError::Catalog(format!("primary key ordinal {ordinal} out of range"))
            })?;
            col.nullable = false;
        }
        self.primary_key = Some(key);
        Ok(self)
    }

    /// Returns the ordinal for a column name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_ordinal.get(name).copied()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The runtime schema this table exposes, qualified with the given
    /// effective table name (the table's own name, or its FROM alias).
    pub fn to_schema(&self, qualifier: &str) -> Schema {
        Schema::new(self.columns.clone()).with_qualifier(qualifier)
    }
}

/// A foreign key constraint, stored for catalog completeness.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    pub columns: Vec<usize>,
    pub ref_table: String,
    pub ref_columns: Vec<usize>,
}

/// Physical statistics for a table, refreshed by ANALYZE.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TableStats {
    pub num_tuples: u64,
    pub num_pages: u64,
    pub avg_tuple_size: f32,
    /// One entry per column, aligned with the schema ordinals.
    pub columns: Vec<ColumnStats>,
}

/// Per-column statistics used by the selectivity estimator.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ColumnStats {
    pub num_distinct: u64,
    pub num_nulls: u64,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

/// Metadata describing a table index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMeta {
    pub id: IndexId,
    pub name: String,
    pub columns: Vec<usize>,
    pub kind: IndexKind,
    pub storage: StorageDescriptor,
}

/// Supported index implementations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndexKind {
    BTree,
    Hash,
}

/// Links catalog entries to physical storage artifacts, such as heap files.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageDescriptor {
    pub file_id: Uuid,
}

impl StorageDescriptor {
    pub fn new() -> Self {
        Self {
            file_id: Uuid::new_v4(),
        }
    }
}

impl Default for StorageDescriptor {
    fn default() -> Self {
        Self::new()
    }
}
