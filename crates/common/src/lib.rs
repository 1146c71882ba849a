
pub mod pretty;
mod schema;

pub use schema::{ColumnInfo, ColumnName, Schema};

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;
use types::Value;

/// Logical identifier for a page in the storage layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

/// Logical identifier for a table registered in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub u64);

/// Fully-qualified identifier for a record within a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

/// Positional tuple backed by `types::Value`.
///
/// Two flavours exist. Materialised tuples own plain values and are always
/// safe to retain (`cacheable`). Page-backed tuples come out of a heap scan
/// carrying the record id they were read from; their validity is bounded by
/// the backing page, so an operator that wants to hold one across `next`
/// calls must call [`Tuple::into_cacheable`] first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tuple {
    pub values: Vec<Value>,
    #[serde(skip)]
    #[serde(default)]
    rid: Option<RecordId>,
    #[serde(skip)]
    #[serde(default = "default_cacheable")]
    cacheable: bool,
}

fn default_cacheable() -> bool {
    true
}

impl Tuple {
    /// A materialised literal tuple: always cacheable, never updatable.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            rid: None,
            cacheable: true,
        }
    }

    /// A tuple read out of a heap page, stamped with its record id.
    pub fn page_backed(values: Vec<Value>, rid: RecordId) -> Self {
        Self {
            values,
            rid: Some(rid),
            cacheable: false,
        }
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Whether this tuple may be retained across `next`/`mark` calls.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Whether writes can be routed back to storage for this tuple.
    pub fn is_updatable(&self) -> bool {
        self.rid.is_some()
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    /// Detach the tuple from its backing page, making it safe to retain.
    pub fn into_cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// An all-NULL tuple of the given width, used for outer-join padding.
    pub fn nulls(width: usize) -> Self {
        Self::new(vec![Value::Null; width])
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Tuple::new(values)
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

/// Rectangular result set carrying column labels and rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Tuple>,
}

/// Canonical error type shared across database subsystems.
///
/// `Schema`, `Type`, `Plan`, `Storage`, `Io` and `Cancelled` form the query
/// engine's error taxonomy; `Parser` and `Catalog` cover the surrounding
/// layers.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("parse: {0}")]
    Parser(String),
    #[error("schema: {0}")]
    Schema(String),
    #[error("type: {0}")]
    Type(String),
    #[error("plan: {0}")]
    Plan(String),
    #[error("catalog: {0}")]
    Catalog(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database components.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .page_size(8192)
///     .buffer_pool_pages(512)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory where table data and catalog metadata live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Fixed-size page allocation in bytes.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Number of pages the buffer pool keeps resident.
    #[builder(default = 256)]
    pub buffer_pool_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            page_size: 4096,
            buffer_pool_pages: 256,
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        ColumnInfo, ColumnName, Config, DbError, DbResult, RecordBatch, Schema, Tuple,
    };
    pub use types::{SqlType, Value};
}
