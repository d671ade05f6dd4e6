use crate::access::{DataType, KeyOrder};
use crate::catalog::TableId;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;

/// A table as seen by the storage layer.
///
/// `page_ids` is the table's logical row order: reading the pages in this sequence and the
/// records of each page by slot yields the rows sorted by primary key. A page's id is its
/// physical slot in the table file, so after splits the two orders differ.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    id: TableId,
    name: String,
    page_ids: Vec<PageId>,
    layout: Vec<DataType>,
    key: KeyOrder,
}

impl Table {
    pub fn new(
        id: TableId,
        name: impl Into<String>,
        layout: Vec<DataType>,
        key: KeyOrder,
        page_ids: Vec<PageId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            page_ids,
            layout,
            key,
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column types in record order.
    pub fn layout(&self) -> &[DataType] {
        &self.layout
    }

    pub fn key(&self) -> &KeyOrder {
        &self.key
    }

    pub fn page_ids(&self) -> &[PageId] {
        &self.page_ids
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page_ids.is_empty()
    }

    /// The page that ends the table in logical order.
    pub fn last_page_id(&self) -> Option<PageId> {
        self.page_ids.last().copied()
    }

    /// The id the next allocated page will get: one past the highest slot in the file.
    pub fn next_page_id(&self) -> PageId {
        PageId(self.page_ids.len() as u32)
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.page_ids.contains(&page_id)
    }

    /// Position of a page in logical order.
    pub fn position_of(&self, page_id: PageId) -> Option<usize> {
        self.page_ids.iter().position(|&id| id == page_id)
    }

    pub fn push_page(&mut self, page_id: PageId) {
        self.page_ids.push(page_id);
    }

    /// Splice `new_page` into the sequence right after `source`.
    pub fn insert_page_after(&mut self, source: PageId, new_page: PageId) -> StorageResult<()> {
        let position = self
            .position_of(source)
            .ok_or(StorageError::PageNotInTable {
                table_id: self.id,
                page_id: source,
            })?;
        self.page_ids.insert(position + 1, new_page);
        Ok(())
    }
}
