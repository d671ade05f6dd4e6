pub mod table_file;

pub use table_file::{TableFile, HEADER_SIZE};
