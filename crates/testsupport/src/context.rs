//! Isolated database contexts over temporary storage.

use common::{Config, DbResult};
use database::Database;
use tempfile::TempDir;

/// A database session backed by a temporary directory; everything is
/// removed when the context drops.
pub struct TestContext {
    db: Database,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Create a fresh, empty database.
    pub fn new() -> DbResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config = Config::builder()
            .data_dir(temp_dir.path().to_path_buf())
            .buffer_pool_pages(16)
            .build();
        Ok(Self {
            db: Database::open(config)?,
            _temp_dir: temp_dir,
        })
    }

    /// Create a database and run setup SQL against it.
    pub fn with_setup(sql: &str) -> DbResult<Self> {
        let mut ctx = Self::new()?;
        ctx.db.execute(sql)?;
        Ok(ctx)
    }

    pub fn db(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn catalog(&self) -> &catalog::Catalog {
        self.db.catalog()
    }
}
