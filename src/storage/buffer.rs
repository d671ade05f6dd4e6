pub mod lru;
pub mod replacer;

use crate::access::DataType;
use crate::catalog::TableId;
use crate::storage::disk::TableFile;
use crate::storage::error::StorageError;
use crate::storage::page::{codec, Page, PageId};
use crate::storage::table::Table;
use anyhow::{anyhow, ensure, Result};
use log::{debug, info};
use replacer::{FrameId, Replacer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A cached page and the table that owns it.
#[derive(Debug)]
struct Frame {
    table_id: TableId,
    page: Page,
}

/// What the buffer knows about a table whose pages it caches. Refreshed from the
/// caller's `Table` on every call, so eviction can write the current page-count header.
#[derive(Debug)]
struct TableEntry {
    name: String,
    layout: Vec<DataType>,
    page_count: u32,
    file: TableFile,
}

/// Result of splitting a page in two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSplit {
    /// The page that was split; it keeps the first `retained` records.
    pub source: PageId,
    /// The page holding the other `moved` records, placed right after `source`.
    pub new_page: PageId,
    pub retained: usize,
    pub moved: usize,
}

/// Capacity-bounded cache of decoded pages keyed by (table, page id).
///
/// Pages are modified in place while cached and written back to their table file when
/// they are evicted or when the buffer is purged. Eviction picks the least recently used
/// page, writes it together with its table's page-count header, and drops it.
#[derive(Debug)]
pub struct PageBuffer {
    db_dir: PathBuf,
    page_size: usize,
    capacity: usize,
    page_table: HashMap<(TableId, PageId), FrameId>,
    frames: HashMap<FrameId, Frame>,
    replacer: Box<dyn Replacer>,
    tables: HashMap<TableId, TableEntry>,
    next_frame_id: FrameId,
}

impl PageBuffer {
    pub fn new(db_dir: &Path, page_size: usize, capacity: usize) -> Result<Self> {
        ensure!(capacity > 0, "Page buffer needs room for at least one page");
        Ok(Self {
            db_dir: db_dir.to_path_buf(),
            page_size,
            capacity,
            page_table: HashMap::with_capacity(capacity + 1),
            frames: HashMap::with_capacity(capacity + 1),
            replacer: Box::new(lru::LruReplacer::new(capacity + 1)),
            tables: HashMap::new(),
            next_frame_id: 0,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently cached.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_cached(&self, table_id: TableId, page_id: PageId) -> bool {
        self.page_table.contains_key(&(table_id, page_id))
    }

    /// The data file of a table in this buffer's database directory.
    pub fn table_file(&self, table_id: TableId) -> TableFile {
        TableFile::new(&self.db_dir, table_id, self.page_size)
    }

    /// Fetch a page for reading or modification, loading it from disk if needed. The page
    /// becomes the most recently used one.
    pub fn get_page(&mut self, table: &Table, page_id: PageId) -> Result<&mut Page> {
        self.register(table);
        if !table.contains_page(page_id) {
            return Err(StorageError::PageNotInTable {
                table_id: table.id(),
                page_id,
            }
            .into());
        }

        let frame_id = match self.page_table.get(&(table.id(), page_id)) {
            Some(&frame_id) => {
                self.replacer.record_access(frame_id);
                frame_id
            }
            None => {
                let page = self.load_page(table, page_id)?;
                self.install(table.id(), page)?
            }
        };

        self.frames
            .get_mut(&frame_id)
            .map(|frame| &mut frame.page)
            .ok_or_else(|| anyhow!("Frame {} vanished from the page buffer", frame_id))
    }

    /// Cache `page` as the most recently used page of `table`, replacing a cached copy with
    /// the same id. Evicts if the buffer is over capacity.
    pub fn add_page(&mut self, page: Page, table: &Table) -> Result<()> {
        self.register(table);
        self.install(table.id(), page)?;
        Ok(())
    }

    /// Split an overflowing page in two.
    ///
    /// Records are taken from the front until their cumulative size reaches half of the
    /// page's size; the rest move to a new page whose id is the next unused one in the
    /// table file and which is spliced into the table's page order right after the source.
    pub fn split_page(&mut self, table: &mut Table, page_id: PageId) -> Result<PageSplit> {
        let page_size = self.page_size;
        let (retained, moved) = {
            let page = self.get_page(table, page_id)?;
            let at = page.split_point().ok_or(StorageError::RecordTooLarge {
                size: page.byte_size(),
                budget: page.budget(),
            })?;
            (at, page.split_off(at))
        };

        let new_page_id = table.next_page_id();
        table.insert_page_after(page_id, new_page_id)?;
        self.register(table);

        let split = PageSplit {
            source: page_id,
            new_page: new_page_id,
            retained,
            moved: moved.len(),
        };
        debug!(
            "Split page {} of table {}: {} records stay, {} move to page {}",
            page_id,
            table.name(),
            split.retained,
            split.moved,
            new_page_id
        );

        if let Some(&frame_id) = self.page_table.get(&(table.id(), page_id)) {
            self.replacer.record_access(frame_id);
        }
        self.install(table.id(), Page::from_records(new_page_id, page_size, moved))?;

        Ok(split)
    }

    /// Evict pages that were kept past capacity while they were over budget. Called once
    /// every page touched by an insert fits again.
    pub fn shrink_to_capacity(&mut self) -> Result<()> {
        self.evict_overflow(None)
    }

    /// Drop every cached page of the named table without writing it back.
    pub fn remove_table(&mut self, name: &str) -> usize {
        let table_ids: Vec<TableId> = self
            .tables
            .iter()
            .filter(|(_, entry)| entry.name == name)
            .map(|(&id, _)| id)
            .collect();

        let mut removed = 0;
        for table_id in table_ids {
            let keys: Vec<(TableId, PageId)> = self
                .page_table
                .keys()
                .filter(|(owner, _)| *owner == table_id)
                .copied()
                .collect();
            for key in keys {
                if let Some(frame_id) = self.page_table.remove(&key) {
                    self.frames.remove(&frame_id);
                    self.replacer.remove(frame_id);
                    removed += 1;
                }
            }
            self.tables.remove(&table_id);
        }

        debug!("Removed {} cached pages of table {}", removed, name);
        removed
    }

    /// Write every cached page and every known table's page-count header, then empty the
    /// cache.
    pub fn purge(&mut self) -> Result<()> {
        let mut frames: Vec<(FrameId, Frame)> = self.frames.drain().collect();
        frames.sort_by_key(|(_, frame)| (frame.table_id, frame.page.page_id()));

        for (frame_id, frame) in &frames {
            self.replacer.remove(*frame_id);
            self.write_page(frame.table_id, &frame.page)?;
        }
        for entry in self.tables.values() {
            entry.file.write_page_count(entry.page_count)?;
        }
        self.page_table.clear();

        info!(
            "Purged {} pages of {} tables to disk",
            frames.len(),
            self.tables.len()
        );
        Ok(())
    }

    fn register(&mut self, table: &Table) {
        let page_count = table.page_count() as u32;
        let entry = self
            .tables
            .entry(table.id())
            .or_insert_with(|| TableEntry {
                name: table.name().to_string(),
                layout: table.layout().to_vec(),
                page_count,
                file: TableFile::new(&self.db_dir, table.id(), self.page_size),
            });
        entry.page_count = page_count;
        if entry.layout != table.layout() {
            entry.layout = table.layout().to_vec();
        }
    }

    fn load_page(&self, table: &Table, page_id: PageId) -> Result<Page> {
        let file = self.table_file(table.id());
        let data = file.read_page(page_id)?;
        let page = codec::decode_page(page_id, self.page_size, &data, table.layout())?;
        debug!(
            "Loaded page {} of table {} ({} records)",
            page_id,
            table.name(),
            page.record_count()
        );
        Ok(page)
    }

    fn install(&mut self, table_id: TableId, page: Page) -> Result<FrameId> {
        let key = (table_id, page.page_id());
        let frame_id = match self.page_table.get(&key) {
            Some(&frame_id) => frame_id,
            None => {
                let frame_id = self.next_frame_id;
                self.next_frame_id += 1;
                self.page_table.insert(key, frame_id);
                frame_id
            }
        };
        self.frames.insert(frame_id, Frame { table_id, page });
        self.replacer.record_access(frame_id);

        self.evict_overflow(Some(frame_id))?;
        Ok(frame_id)
    }

    /// Evict least recently used pages until the buffer is back within capacity.
    ///
    /// A page over its byte budget is waiting for a split and cannot be written, so it is
    /// skipped and stays cached, as does `keep`, the page being handed out. A page leaves
    /// the cache only after it has been written.
    fn evict_overflow(&mut self, keep: Option<FrameId>) -> Result<()> {
        let mut skipped = Vec::new();
        let result = self.evict_writable(keep, &mut skipped);
        for frame_id in skipped {
            self.replacer.record_access(frame_id);
        }
        result
    }

    fn evict_writable(&mut self, keep: Option<FrameId>, skipped: &mut Vec<FrameId>) -> Result<()> {
        while self.frames.len() > self.capacity {
            let Some(frame_id) = self.replacer.evict() else {
                break;
            };
            let Some(frame) = self.frames.get(&frame_id) else {
                continue;
            };
            if keep == Some(frame_id) || frame.page.is_full() {
                skipped.push(frame_id);
                continue;
            }

            let (table_id, page_id) = (frame.table_id, frame.page.page_id());
            debug!("Evicting page {} of table {}", page_id, table_id);
            if let Err(e) = self.write_back(table_id, &frame.page) {
                self.replacer.record_access(frame_id);
                return Err(e);
            }
            self.frames.remove(&frame_id);
            self.page_table.remove(&(table_id, page_id));
        }
        Ok(())
    }

    /// Write a page together with its table's page-count header.
    fn write_back(&self, table_id: TableId, page: &Page) -> Result<()> {
        self.write_page(table_id, page)?;
        if let Some(entry) = self.tables.get(&table_id) {
            entry.file.write_page_count(entry.page_count)?;
        }
        Ok(())
    }

    fn write_page(&self, table_id: TableId, page: &Page) -> Result<()> {
        let entry = self
            .tables
            .get(&table_id)
            .ok_or(StorageError::UnknownTable(table_id))?;
        let data = codec::encode_page(page, &entry.layout)?;
        entry.file.write_page(page.page_id(), &data)
    }
}
