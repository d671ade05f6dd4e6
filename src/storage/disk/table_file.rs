use crate::catalog::TableId;
use crate::storage::error::StorageError;
use crate::storage::page::PageId;
use anyhow::{Context, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Size of the page-count header at the start of a table file.
pub const HEADER_SIZE: u64 = 4;

/// One table's data file.
///
/// The file starts with a big-endian int32 page count followed by fixed-size page slots;
/// page `k` lives at `HEADER_SIZE + k * page_size`. A file handle is opened for each call
/// and dropped before it returns.
#[derive(Debug, Clone)]
pub struct TableFile {
    path: PathBuf,
    page_size: usize,
}

impl TableFile {
    /// The data file of `table_id` inside `dir`. The file is named by the table id.
    pub fn new(dir: &Path, table_id: TableId, page_size: usize) -> Self {
        Self {
            path: dir.join(table_id.to_string()),
            page_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create an empty file with a zero page count, truncating any existing one.
    pub fn create(&self) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("Failed to create file: {:?}", self.path))?;
        file.write_i32::<BigEndian>(0)
            .context("Failed to write page count")?;
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove file: {:?}", self.path))?;
        }
        Ok(())
    }

    /// The page count stored in the header. An empty file holds no pages.
    pub fn read_page_count(&self) -> Result<u32> {
        let mut file = self.open_read()?;
        if file.metadata()?.len() < HEADER_SIZE {
            return Ok(0);
        }
        let count = file
            .read_i32::<BigEndian>()
            .context("Failed to read page count")?;
        u32::try_from(count)
            .map_err(|_| StorageError::Corrupt(format!("negative page count {}", count)).into())
    }

    pub fn write_page_count(&self, count: u32) -> Result<()> {
        let mut file = self.open_write()?;
        file.seek(SeekFrom::Start(0)).context("Failed to seek")?;
        file.write_i32::<BigEndian>(count as i32)
            .context("Failed to write page count")?;
        Ok(())
    }

    /// Read the raw bytes of page slot `page_id`.
    pub fn read_page(&self, page_id: PageId) -> Result<Vec<u8>> {
        let mut file = self.open_read()?;
        let offset = self.page_offset(page_id);
        let file_len = file.metadata()?.len();

        if offset + self.page_size as u64 > file_len {
            return Err(StorageError::TruncatedFile {
                path: self.path.clone(),
                page_id,
                file_len,
            }
            .into());
        }

        let mut buf = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(offset))
            .context("Failed to seek")?;
        file.read_exact(&mut buf)
            .with_context(|| format!("Failed to read page {} of {:?}", page_id, self.path))?;
        Ok(buf)
    }

    /// Write `data` into page slot `page_id`, zero-padding it to the page size. The file
    /// grows as needed.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() > self.page_size {
            return Err(StorageError::PageOverflow {
                page_id,
                size: data.len(),
                page_size: self.page_size,
            }
            .into());
        }

        let mut slot = Vec::with_capacity(self.page_size);
        slot.extend_from_slice(data);
        slot.resize(self.page_size, 0);

        let mut file = self.open_write()?;
        file.seek(SeekFrom::Start(self.page_offset(page_id)))
            .context("Failed to seek")?;
        file.write_all(&slot)
            .with_context(|| format!("Failed to write page {} of {:?}", page_id, self.path))?;
        Ok(())
    }

    fn page_offset(&self, page_id: PageId) -> u64 {
        HEADER_SIZE + page_id.0 as u64 * self.page_size as u64
    }

    fn open_read(&self) -> Result<File> {
        File::open(&self.path).with_context(|| format!("Failed to open file: {:?}", self.path))
    }

    fn open_write(&self) -> Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("Failed to open file: {:?}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 64;

    #[test]
    fn test_create_and_read_header() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(7), PAGE_SIZE);
        assert!(!file.exists());

        file.create()?;
        assert!(file.exists());
        assert_eq!(file.path(), dir.path().join("7"));
        assert_eq!(file.read_page_count()?, 0);

        file.write_page_count(3)?;
        assert_eq!(file.read_page_count()?, 3);
        assert_eq!(&fs::read(file.path())?[..4], &[0, 0, 0, 3]);
        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(1), PAGE_SIZE);
        file.create()?;

        file.write_page(PageId(1), &[42, 24])?;
        assert_eq!(fs::metadata(file.path())?.len(), HEADER_SIZE + 2 * PAGE_SIZE as u64);

        let page = file.read_page(PageId(1))?;
        assert_eq!(page.len(), PAGE_SIZE);
        assert_eq!(&page[..3], &[42, 24, 0]);

        // The gap before page 1 reads back as zeros
        let gap = file.read_page(PageId(0))?;
        assert!(gap.iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_overwrite_page() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(1), PAGE_SIZE);
        file.create()?;

        file.write_page(PageId(0), &[1u8; PAGE_SIZE])?;
        file.write_page(PageId(0), &[2u8; 8])?;

        let page = file.read_page(PageId(0))?;
        assert_eq!(page[0], 2);
        assert_eq!(page[8], 0);
        Ok(())
    }

    #[test]
    fn test_header_survives_page_writes() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(1), PAGE_SIZE);
        file.create()?;
        file.write_page_count(2)?;

        file.write_page(PageId(0), &[9u8; 4])?;
        assert_eq!(file.read_page_count()?, 2);
        Ok(())
    }

    #[test]
    fn test_read_past_end_is_truncated() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(1), PAGE_SIZE);
        file.create()?;

        let err = file.read_page(PageId(10)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::TruncatedFile { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_file_fails() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(1), PAGE_SIZE);
        assert!(file.read_page(PageId(0)).is_err());
        assert!(file.read_page_count().is_err());
        Ok(())
    }

    #[test]
    fn test_oversized_page_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(1), PAGE_SIZE);
        file.create()?;

        let result = file.write_page(PageId(0), &[0u8; PAGE_SIZE + 1]);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_remove() -> Result<()> {
        let dir = tempdir()?;
        let file = TableFile::new(dir.path(), TableId(1), PAGE_SIZE);
        file.create()?;
        file.remove()?;
        assert!(!file.exists());
        // Removing twice is fine
        file.remove()?;
        Ok(())
    }
}
