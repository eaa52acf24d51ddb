use std::path::Path;

use crate::common::{PageID, Result, StoreError, PAGE_SIZE};
use crate::storage::{File, MemoryFile, PosixFile};

/// Owns the data file and performs whole-page reads and writes at
/// page-aligned offsets. The file is headerless: page `p` lives at byte
/// offset `p * PAGE_SIZE`, and the logical length need not be a multiple
/// of the page size (the tail page may be short).
pub struct Pager {
    file: Box<dyn File + Send>,
}

impl Pager {
    /// Open the data file read-write, creating it if absent.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: Box::new(PosixFile::open(path)?),
        })
    }

    /// Pager backed by a volatile in-memory file.
    pub fn in_memory() -> Self {
        Self {
            file: Box::new(MemoryFile::new()),
        }
    }

    /// Read page `p`. Pages at or past the end of the file come back
    /// all-zero; a short tail page is zero-padded to full size.
    pub fn read_page(&mut self, page_id: PageID) -> Result<Vec<u8>> {
        let mut data = vec![0u8; PAGE_SIZE];
        let offset = page_id.0 * PAGE_SIZE as u64;
        let file_len = self.file.len()?;
        if offset >= file_len {
            return Ok(data);
        }
        let available = ((file_len - offset) as usize).min(PAGE_SIZE);
        self.file.read_at(offset, &mut data[..available])?;
        Ok(data)
    }

    /// Write page `p` in full, extending the file as needed.
    pub fn write_page(&mut self, page_id: PageID, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(StoreError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }
        let offset = page_id.0 * PAGE_SIZE as u64;
        self.file.write_at(offset, data)?;
        Ok(())
    }

    /// Current byte length of the data file.
    pub fn length(&self) -> Result<u64> {
        self.file.len()
    }

    /// Truncate or extend the data file to exactly `len` bytes.
    /// Extension zero-fills.
    pub fn set_length(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }
}
