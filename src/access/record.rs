use crate::access::value::Value;
use crate::storage::page::PageId;
use std::fmt;

/// Bytes of per-record overhead: the bitmap length prefix.
const BITMAP_LEN_SIZE: usize = 4;
/// Bytes per bitmap entry.
const BITMAP_ENTRY_SIZE: usize = 4;

/// Physical location of a record: its slot within a page of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordPointer {
    pub slot: u32,
    pub page_id: PageId,
}

impl RecordPointer {
    pub fn new(slot: u32, page_id: PageId) -> Self {
        Self { slot, page_id }
    }
}

impl fmt::Display for RecordPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(slot {}, page {})", self.slot, self.page_id)
    }
}

/// Represents a row in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Presence flag per field, in schema order.
    pub fn presence(&self) -> impl Iterator<Item = bool> + '_ {
        self.values.iter().map(|v| !v.is_null())
    }

    /// Serialized size: bitmap length, one bitmap entry per field and the present values.
    pub fn byte_size(&self) -> usize {
        BITMAP_LEN_SIZE
            + self.values.len() * BITMAP_ENTRY_SIZE
            + self.values.iter().map(Value::encoded_len).sum::<usize>()
    }
}
