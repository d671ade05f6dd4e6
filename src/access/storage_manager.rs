//! Record placement on top of the page buffer.

use crate::access::record::{Record, RecordPointer};
use crate::access::scan::TableScanner;
use crate::access::value::Value;
use crate::storage::buffer::{PageBuffer, PageSplit};
use crate::storage::error::StorageError;
use crate::storage::page::{Page, PageId, PAGE_HEADER_SIZE};
use crate::storage::table::Table;
use anyhow::Result;
use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Where an inserted record ended up, and the page splits its insertion caused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    pub pointer: RecordPointer,
    pub splits: Vec<PageSplit>,
}

/// Places records into a table's pages so that the table's logical order is its
/// primary-key order.
#[derive(Debug)]
pub struct StorageManager {
    buffer: PageBuffer,
}

impl StorageManager {
    pub fn new(buffer: PageBuffer) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &PageBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut PageBuffer {
        &mut self.buffer
    }

    pub fn page_size(&self) -> usize {
        self.buffer.page_size()
    }

    /// Give an empty table its first page.
    pub fn allocate_first_page(&mut self, table: &mut Table) -> Result<PageId> {
        let page_id = table.next_page_id();
        table.push_page(page_id);
        self.buffer
            .add_page(Page::new(page_id, self.buffer.page_size()), table)?;
        debug!("Allocated page {} for table {}", page_id, table.name());
        Ok(page_id)
    }

    /// Insert a record at its primary-key position.
    ///
    /// Pages are scanned in table order and the record goes right before the first record
    /// it precedes or equals. When no such record exists it is appended to the table's last
    /// page. Overflowing pages are split and the returned pointer is where the record lives
    /// afterwards.
    pub fn insert_record(&mut self, table: &mut Table, record: Record) -> Result<InsertOutcome> {
        self.check_fits(&record)?;

        if table.is_empty() {
            let page_id = self.allocate_first_page(table)?;
            self.buffer.get_page(table, page_id)?.push(record);
            return self.settle(table, RecordPointer::new(0, page_id));
        }

        let key = *table.key();
        let mut target = None;
        for &page_id in table.page_ids() {
            let page = self.buffer.get_page(table, page_id)?;
            if let Some(slot) = page
                .records()
                .iter()
                .position(|existing| key.precedes_or_equals(&record, existing))
            {
                target = Some(RecordPointer::new(slot as u32, page_id));
                break;
            }
        }

        let pointer = match target {
            Some(pointer) => {
                self.buffer
                    .get_page(table, pointer.page_id)?
                    .insert(pointer.slot as usize, record)?;
                pointer
            }
            None => {
                let page_id = table
                    .last_page_id()
                    .ok_or_else(|| anyhow::anyhow!("Table {} has no pages", table.name()))?;
                let slot = self.buffer.get_page(table, page_id)?.push(record);
                RecordPointer::new(slot as u32, page_id)
            }
        };

        self.settle(table, pointer)
    }

    /// Insert a record at a location computed by the index. An empty table gets its first
    /// page before the record is placed.
    pub fn insert_using_rp(
        &mut self,
        pointer: RecordPointer,
        record: Record,
        table: &mut Table,
    ) -> Result<InsertOutcome> {
        self.check_fits(&record)?;

        let pointer = if table.is_empty() {
            let page_id = self.allocate_first_page(table)?;
            RecordPointer::new(pointer.slot, page_id)
        } else {
            pointer
        };

        self.buffer
            .get_page(table, pointer.page_id)?
            .insert(pointer.slot as usize, record)?;

        self.settle(table, pointer)
    }

    /// Split every page touched by an insert until all of them fit, tracking where the
    /// inserted record moves.
    fn settle(&mut self, table: &mut Table, pointer: RecordPointer) -> Result<InsertOutcome> {
        let mut pointer = pointer;
        let mut splits = Vec::new();
        let mut pending = vec![pointer.page_id];

        while let Some(page_id) = pending.pop() {
            if !self.buffer.get_page(table, page_id)?.is_full() {
                continue;
            }

            let split = self.buffer.split_page(table, page_id)?;
            if pointer.page_id == split.source && pointer.slot as usize >= split.retained {
                pointer = RecordPointer::new(pointer.slot - split.retained as u32, split.new_page);
            }
            pending.push(split.source);
            pending.push(split.new_page);
            splits.push(split);
        }

        self.buffer.shrink_to_capacity()?;
        Ok(InsertOutcome { pointer, splits })
    }

    fn check_fits(&self, record: &Record) -> Result<()> {
        let budget = self.buffer.page_size().saturating_sub(PAGE_HEADER_SIZE);
        let size = record.byte_size();
        if size > budget {
            return Err(StorageError::RecordTooLarge { size, budget }.into());
        }
        Ok(())
    }

    /// Every (primary key, pointer) pair on the pages involved in `splits`.
    pub fn relocated_keys(
        &mut self,
        table: &Table,
        splits: &[PageSplit],
    ) -> Result<Vec<(Value, RecordPointer)>> {
        let pages: BTreeSet<PageId> = splits
            .iter()
            .flat_map(|split| [split.source, split.new_page])
            .collect();

        let key = *table.key();
        let mut relocated = Vec::new();
        for page_id in pages {
            let page = self.buffer.get_page(table, page_id)?;
            for (slot, record) in page.records().iter().enumerate() {
                relocated.push((
                    key.key_of(record).clone(),
                    RecordPointer::new(slot as u32, page_id),
                ));
            }
        }
        Ok(relocated)
    }

    pub fn scan<'a>(&'a mut self, table: &'a Table) -> TableScanner<'a> {
        TableScanner::new(&mut self.buffer, table)
    }

    pub fn all_records(&mut self, table: &Table) -> Result<Vec<Record>> {
        self.scan(table)
            .map(|item| item.map(|(_, record)| record))
            .collect()
    }

    /// Every record with the field at `attr_idx` removed.
    pub fn drop_alter_records(&mut self, table: &Table, attr_idx: usize) -> Result<Vec<Record>> {
        self.scan(table)
            .map(|item| {
                let (_, record) = item?;
                let mut values = record.into_values();
                if attr_idx < values.len() {
                    values.remove(attr_idx);
                }
                Ok(Record::new(values))
            })
            .collect()
    }

    /// Every record with `default` appended as a new last field.
    pub fn add_alter_records(&mut self, table: &Table, default: &Value) -> Result<Vec<Record>> {
        self.scan(table)
            .map(|item| {
                let (_, record) = item?;
                let mut values = record.into_values();
                values.push(default.clone());
                Ok(Record::new(values))
            })
            .collect()
    }

    pub fn record_at(&mut self, table: &Table, pointer: RecordPointer) -> Result<Option<Record>> {
        if !table.contains_page(pointer.page_id) {
            return Ok(None);
        }
        let page = self.buffer.get_page(table, pointer.page_id)?;
        Ok(page.get(pointer.slot as usize).cloned())
    }

    /// Locate a record by primary key with a scan. Stops early once the scan passes the key.
    pub fn find_by_key(
        &mut self,
        table: &Table,
        key: &Value,
    ) -> Result<Option<(RecordPointer, Record)>> {
        let order = *table.key();
        for item in self.scan(table) {
            let (pointer, record) = item?;
            match order.compare_keys(order.key_of(&record), key) {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(Some((pointer, record))),
                Ordering::Greater => break,
            }
        }
        Ok(None)
    }

    pub fn remove_at(&mut self, table: &Table, pointer: RecordPointer) -> Result<Record> {
        let page = self.buffer.get_page(table, pointer.page_id)?;
        Ok(page.remove(pointer.slot as usize)?)
    }

    /// Remove every record matching `predicate` and return them in table order. Pages stay
    /// allocated even when they become empty.
    pub fn delete_where<F>(&mut self, table: &Table, mut predicate: F) -> Result<Vec<Record>>
    where
        F: FnMut(&Record) -> bool,
    {
        let mut deleted = Vec::new();
        for &page_id in table.page_ids() {
            let page = self.buffer.get_page(table, page_id)?;
            let (removed, kept): (Vec<Record>, Vec<Record>) =
                page.records_mut().drain(..).partition(|r| predicate(r));
            *page.records_mut() = kept;
            deleted.extend(removed);
        }
        debug!(
            "Deleted {} records from table {}",
            deleted.len(),
            table.name()
        );
        Ok(deleted)
    }

    /// Empty every page of the table. Returns the number of records removed.
    pub fn clear_table(&mut self, table: &Table) -> Result<usize> {
        let mut removed = 0;
        for &page_id in table.page_ids() {
            let page = self.buffer.get_page(table, page_id)?;
            removed += page.record_count();
            page.clear();
        }
        Ok(removed)
    }

    pub fn record_count(&mut self, table: &Table) -> Result<usize> {
        let mut count = 0;
        for &page_id in table.page_ids() {
            count += self.buffer.get_page(table, page_id)?.record_count();
        }
        Ok(count)
    }

    pub fn remove_table(&mut self, name: &str) -> usize {
        self.buffer.remove_table(name)
    }

    pub fn purge(&mut self) -> Result<()> {
        self.buffer.purge()
    }
}
