pub mod codec;

use crate::access::Record;
use crate::storage::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes taken by the record-count header at the start of every page slot.
pub const PAGE_HEADER_SIZE: usize = 4;

/// Identifier of a page inside its table file. Equal to the page's physical slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered run of records. A record's position in the page is its slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    page_id: PageId,
    page_size: usize,
    records: Vec<Record>,
}

impl Page {
    pub fn new(page_id: PageId, page_size: usize) -> Self {
        Self {
            page_id,
            page_size,
            records: Vec::new(),
        }
    }

    pub fn from_records(page_id: PageId, page_size: usize, records: Vec<Record>) -> Self {
        Self {
            page_id,
            page_size,
            records,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Bytes available for records once the page header is accounted for.
    pub fn budget(&self) -> usize {
        self.page_size.saturating_sub(PAGE_HEADER_SIZE)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Record> {
        self.records.get(slot)
    }

    /// Serialized size of the records held by this page, excluding the header.
    pub fn byte_size(&self) -> usize {
        self.records.iter().map(Record::byte_size).sum()
    }

    pub fn is_full(&self) -> bool {
        self.byte_size() > self.budget()
    }

    /// Insert a record at `slot`, shifting every later record down by one.
    pub fn insert(&mut self, slot: usize, record: Record) -> StorageResult<()> {
        if slot > self.records.len() {
            return Err(StorageError::InvalidSlot {
                slot,
                page_id: self.page_id,
                len: self.records.len(),
            });
        }
        self.records.insert(slot, record);
        Ok(())
    }

    /// Append a record and return its slot.
    pub fn push(&mut self, record: Record) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn remove(&mut self, slot: usize) -> StorageResult<Record> {
        if slot >= self.records.len() {
            return Err(StorageError::InvalidSlot {
                slot,
                page_id: self.page_id,
                len: self.records.len(),
            });
        }
        Ok(self.records.remove(slot))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of leading records that form the first half of a split.
    ///
    /// Records are taken from the front until their cumulative size reaches half of the
    /// page's current size. Both halves keep at least one record, so a page with fewer
    /// than two records cannot be split.
    pub fn split_point(&self) -> Option<usize> {
        if self.records.len() < 2 {
            return None;
        }

        let target = self.byte_size() / 2;
        let mut cumulative = 0;
        let mut count = 0;
        for record in &self.records {
            cumulative += record.byte_size();
            count += 1;
            if cumulative >= target {
                break;
            }
        }

        Some(count.clamp(1, self.records.len() - 1))
    }

    /// Keep the records before `at` and return the rest.
    pub fn split_off(&mut self, at: usize) -> Vec<Record> {
        self.records.split_off(at)
    }
}
