//! Storage layer error types.

use crate::catalog::TableId;
use crate::storage::page::PageId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid slot: {slot} (page {page_id} holds {len} records)")]
    InvalidSlot {
        slot: usize,
        page_id: PageId,
        len: usize,
    },

    #[error("Record of {size} bytes cannot fit in a page with a {budget} byte budget")]
    RecordTooLarge { size: usize, budget: usize },

    #[error("Page {page_id} is not part of table {table_id}")]
    PageNotInTable { table_id: TableId, page_id: PageId },

    #[error("Table {0} is not registered with the page buffer")]
    UnknownTable(TableId),

    #[error("Table file {path:?} is truncated: page {page_id} ends past byte {file_len}")]
    TruncatedFile {
        path: PathBuf,
        page_id: PageId,
        file_len: u64,
    },

    #[error("Page {page_id} does not fit in its slot: {size} bytes for a {page_size} byte page")]
    PageOverflow {
        page_id: PageId,
        size: usize,
        page_size: usize,
    },

    #[error("Corrupt page data: {0}")]
    Corrupt(String),

    #[error("Duplicate key in index: {0}")]
    DuplicateKey(String),

    #[error("B+Tree order {order} is below the minimum of {minimum}")]
    DegenerateOrder { order: usize, minimum: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
