//! Table scanning functionality for sequential access.

use crate::access::record::{Record, RecordPointer};
use crate::storage::buffer::PageBuffer;
use crate::storage::table::Table;
use anyhow::Result;

/// Iterator over every record of a table in logical order: pages in the table's page-id
/// sequence, records by slot within each page.
pub struct TableScanner<'a> {
    buffer: &'a mut PageBuffer,
    table: &'a Table,
    page_index: usize,
    slot: usize,
}

impl<'a> TableScanner<'a> {
    pub fn new(buffer: &'a mut PageBuffer, table: &'a Table) -> Self {
        Self {
            buffer,
            table,
            page_index: 0,
            slot: 0,
        }
    }

    /// Try to get the next record, moving across pages as they run out
    fn try_next(&mut self) -> Result<Option<(RecordPointer, Record)>> {
        while let Some(&page_id) = self.table.page_ids().get(self.page_index) {
            let page = self.buffer.get_page(self.table, page_id)?;
            if let Some(record) = page.get(self.slot) {
                let pointer = RecordPointer::new(self.slot as u32, page_id);
                self.slot += 1;
                return Ok(Some((pointer, record.clone())));
            }

            self.page_index += 1;
            self.slot = 0;
        }
        Ok(None)
    }
}

impl Iterator for TableScanner<'_> {
    type Item = Result<(RecordPointer, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.try_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                // Stop after the first error
                self.page_index = self.table.page_count();
                Some(Err(e))
            }
        }
    }
}
