//! Access layer for record-oriented operations.
//!
//! This module sits between the page buffer and the database handle:
//!
//! - **Value / DataType**: Typed field values and the per-type key ordering
//! - **Record / RecordPointer**: Rows and their physical (slot, page) locations
//! - **KeyOrder**: The primary-key ordering shared by placement and the index
//! - **StorageManager**: Places records into pages in key order and splits overflowing pages
//! - **TableScanner**: Walks a table's records in logical order
//! - **BPlusTree**: Primary-key index mapping keys to record pointers

pub mod btree;
pub mod key;
pub mod record;
pub mod scan;
pub mod storage_manager;
pub mod value;

pub use btree::BPlusTree;
pub use key::KeyOrder;
pub use record::{Record, RecordPointer};
pub use scan::TableScanner;
pub use storage_manager::{InsertOutcome, StorageManager};
pub use value::{DataType, KeyComparator, Value};
