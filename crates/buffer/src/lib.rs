//! Buffer pool manager for page-level caching and I/O.
//!
//! The buffer pool sits between the storage layer and the executor. Pages
//! are cached with LRU eviction; a page with a non-zero pin count is never
//! evicted. The executor pins a page while it decodes tuples out of it, and
//! a scan that has marked its position keeps a pin on the marked page until
//! the mark is released.
//!
//! Writes performed directly against heap files (DML, ANALYZE) must be
//! followed by [`Pager::invalidate`] so the cache never serves stale pages.


use common::{DbError, DbResult, PageId, TableId};
use hashbrown::HashMap;
use lru::LruCache;
use std::{
    fs::OpenOptions,
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
};
use storage::{PAGE_SIZE, Page};

/// Abstraction for fetching, allocating, pinning, and flushing pages.
pub trait Pager {
    /// Fetch a page from the buffer pool or load it from disk, marking it
    /// as recently used.
    fn fetch_page(&mut self, table: TableId, pid: PageId) -> DbResult<&mut Page>;

    /// Allocate a new page for the given table and return its id.
    fn allocate_page(&mut self, table: TableId) -> DbResult<PageId>;

    /// Number of pages currently backing the table on disk.
    fn num_pages(&mut self, table: TableId) -> DbResult<u64>;

    /// Increment a page's pin count; pinned pages survive eviction.
    fn pin(&mut self, table: TableId, pid: PageId);

    /// Decrement a page's pin count.
    fn unpin(&mut self, table: TableId, pid: PageId);

    /// Mark a cached page dirty so it is written back before eviction.
    fn mark_dirty(&mut self, table: TableId, pid: PageId);

    /// Flush all dirty pages to disk.
    fn flush(&mut self) -> DbResult<()>;

    /// Drop every cached page of a table after an out-of-band write.
    fn invalidate(&mut self, table: TableId);
}

/// File-backed buffer pool with LRU eviction and pin tracking.
///
/// Uses a file-per-table storage model with sequential page ids. Capacity is
/// enforced on fetch: when the cache is full, the least recently used
/// unpinned page is evicted (flushed first if dirty).
#[derive(Debug)]
pub struct FilePager {
    base_dir: PathBuf,
    max_pages: usize,
    cache: LruCache<(TableId, PageId), Page>,
    dirty: HashMap<(TableId, PageId), bool>,
    pins: HashMap<(TableId, PageId), u32>,
}

impl FilePager {
    /// Create a new file-backed pager.
    ///
    /// # Panics
    ///
    /// Panics if `max_pages` is 0.
    pub fn new(base_dir: impl Into<PathBuf>, max_pages: usize) -> Self {
        assert!(max_pages > 0, "max_pages must be > 0");
        Self {
            base_dir: base_dir.into(),
            max_pages,
            cache: LruCache::unbounded(),
            dirty: HashMap::new(),
            pins: HashMap::new(),
        }
    }

    /// Get the file path for a table.
    fn table_path(&self, table: TableId) -> PathBuf {
        self.base_dir.join(storage::table_file_name(table.0))
    }

    fn is_pinned(&self, key: &(TableId, PageId)) -> bool {
        self.pins.get(key).copied().unwrap_or(0) > 0
    }

    /// Load a page from disk, or a zeroed page if it does not exist yet.
    fn load_page(&self, table: TableId, pid: PageId) -> DbResult<Page> {
        let path = self.table_path(table);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DbError::Storage(format!("failed to open table file: {e}")))?;

        let offset = pid.0 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| DbError::Storage(format!("failed to seek to page: {e}")))?;

        let mut buf = vec![0u8; PAGE_SIZE];
        let n = file
            .read(&mut buf)
            .map_err(|e| DbError::Storage(format!("failed to read page: {e}")))?;

        if n == 0 {
            Ok(Page::new(pid.0))
        } else if n < PAGE_SIZE {
            Err(DbError::Storage(format!(
                "partial page read: expected {PAGE_SIZE} bytes, got {n}"
            )))
        } else {
            Ok(Page { id: pid.0, data: buf })
        }
    }

    fn write_page(&self, table: TableId, page: &Page) -> DbResult<()> {
        let path = self.table_path(table);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DbError::Storage(format!("failed to open table file: {e}")))?;

        file.seek(SeekFrom::Start(page.id * PAGE_SIZE as u64))
            .map_err(|e| DbError::Storage(format!("failed to seek to page: {e}")))?;
        file.write_all(&page.data)
            .map_err(|e| DbError::Storage(format!("failed to write page: {e}")))?;
        file.flush()
            .map_err(|e| DbError::Storage(format!("failed to flush page: {e}")))?;
        Ok(())
    }

    /// Evict the least recently used unpinned page, flushing it if dirty.
    /// A cache full of pinned pages is allowed to exceed capacity.
    fn evict_one(&mut self) -> DbResult<()> {
        let victim = self
            .cache
            .iter()
            .rev()
            .map(|(key, _)| *key)
            .find(|key| !self.is_pinned(key));

        let Some(key) = victim else {
            return Ok(());
        };

        if let Some(page) = self.cache.pop(&key) {
            if self.dirty.remove(&key).unwrap_or(false) {
                self.write_page(key.0, &page)?;
            }
        }
        Ok(())
    }

    /// Number of pages currently cached (for tests and diagnostics).
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }
}

impl Pager for FilePager {
    fn fetch_page(&mut self, table: TableId, pid: PageId) -> DbResult<&mut Page> {
        let key = (table, pid);

        if !self.cache.contains(&key) {
            while self.cache.len() >= self.max_pages {
                let before = self.cache.len();
                self.evict_one()?;
                if self.cache.len() == before {
                    break;
                }
            }
            let page = self.load_page(table, pid)?;
            self.cache.put(key, page);
        }

        Ok(self.cache.get_mut(&key).expect("page cached above"))
    }

    fn allocate_page(&mut self, table: TableId) -> DbResult<PageId> {
        let pid = PageId(self.num_pages(table)?);
        // Extend the file eagerly so the id is stable; the page enters the
        // cache on first fetch, subject to the capacity rules.
        self.write_page(table, &Page::new(pid.0))?;
        Ok(pid)
    }

    fn num_pages(&mut self, table: TableId) -> DbResult<u64> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(0);
        }
        let len = path
            .metadata()
            .map_err(|e| DbError::Storage(format!("failed to stat table file: {e}")))?
            .len();
        Ok(len / PAGE_SIZE as u64)
    }

    fn pin(&mut self, table: TableId, pid: PageId) {
        *self.pins.entry((table, pid)).or_insert(0) += 1;
    }

    fn unpin(&mut self, table: TableId, pid: PageId) {
        let key = (table, pid);
        if let Some(count) = self.pins.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.pins.remove(&key);
            }
        }
    }

    fn mark_dirty(&mut self, table: TableId, pid: PageId) {
        self.dirty.insert((table, pid), true);
    }

    fn flush(&mut self) -> DbResult<()> {
        let dirty_keys: Vec<_> = self
            .dirty
            .iter()
            .filter(|(_, d)| **d)
            .map(|(k, _)| *k)
            .collect();
        for key in dirty_keys {
            if let Some(page) = self.cache.peek(&key) {
                self.write_page(key.0, page)?;
            }
            self.dirty.insert(key, false);
        }
        Ok(())
    }

    fn invalidate(&mut self, table: TableId) {
        let keys: Vec<_> = self
            .cache
            .iter()
            .map(|(key, _)| *key)
            .filter(|(t, _)| *t == table)
            .collect();
        for key in keys {
            self.cache.pop(&key);
            self.dirty.remove(&key);
        }
    }
}
