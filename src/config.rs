//! Settings a database is opened with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer holds.
pub const DEFAULT_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the catalog and one file per table.
    pub db_dir: PathBuf,
    /// Page size in bytes. Only used when the database is created; an existing database
    /// keeps the page size stored in its catalog.
    pub page_size: usize,
    /// Number of pages the buffer caches before it evicts.
    pub buffer_size: usize,
    /// Maintain a B+Tree over each table's primary key.
    pub indexing: bool,
    /// Fixed tree order instead of the one derived from the page size.
    pub index_order: Option<usize>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            db_dir: PathBuf::from("pagedb_data"),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            indexing: false,
            index_order: None,
        }
    }
}

impl DatabaseConfig {
    pub fn new(db_dir: impl AsRef<Path>) -> Self {
        DatabaseConfig {
            db_dir: db_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn indexing(mut self, indexing: bool) -> Self {
        self.indexing = indexing;
        self
    }

    pub fn index_order(mut self, order: usize) -> Self {
        self.index_order = Some(order);
        self
    }
}
