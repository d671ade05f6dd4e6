//! Storage layer implementation for pagedb.
//!
//! Tables live in one file each, split into fixed-size page slots. Key components:
//!
//! - **Page**: A bounded, ordered container of records; the unit of caching and I/O
//! - **TableFile**: Reads and writes page slots and the page-count header of a table file
//! - **PageBuffer**: In-memory cache of pages with LRU write-back eviction and page splits
//! - **Table**: A table's ordered page-id sequence, which is its logical row order
//!
//! Everything here is single-threaded and owned by one open database handle.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;
pub mod table;

pub use buffer::{PageBuffer, PageSplit};
pub use disk::TableFile;
pub use error::{StorageError, StorageResult};
pub use page::{Page, PageId, PAGE_HEADER_SIZE};
pub use table::Table;
