use std::fs::{File as StdFile, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::{Result, StoreError};

// File abstraction - lets the pager run against real files or in-memory
// buffers for testing.

pub trait File {
    /// Current byte length.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncate or extend to exactly `new_len` bytes. Extension zero-fills.
    fn set_len(&mut self, new_len: u64) -> Result<()>;

    /// Read exactly `buf.len()` bytes at `offset`. Reading past the end is
    /// an error; callers that tolerate short files must check `len` first.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `data` at `offset`, extending the file as needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Flush buffered writes to the underlying medium.
    fn sync(&mut self) -> Result<()>;
}

pub struct PosixFile {
    file: StdFile,
    cached_len: u64,
}

impl PosixFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let cached_len = file.metadata()?.len();
        Ok(Self { file, cached_len })
    }
}

impl File for PosixFile {
    fn len(&self) -> Result<u64> {
        Ok(self.cached_len)
    }

    fn set_len(&mut self, new_len: u64) -> Result<()> {
        if new_len == self.cached_len {
            return Ok(());
        }
        self.file.set_len(new_len)?;
        self.cached_len = new_len;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.cached_len {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "read past end of file: offset={}, len={}, file_len={}",
                    offset,
                    buf.len(),
                    self.cached_len
                ),
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        let end = offset + data.len() as u64;
        if end > self.cached_len {
            self.cached_len = end;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

// In-memory implementation, used by unit tests to avoid disk I/O.
pub struct MemoryFile {
    data: Vec<u8>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Default for MemoryFile {
    fn default() -> Self {
        Self::new()
    }
}

impl File for MemoryFile {
    fn len(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_len(&mut self, new_len: u64) -> Result<()> {
        self.data.resize(new_len as usize, 0);
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "read past end of file: offset={}, len={}, file_len={}",
                    offset,
                    buf.len(),
                    self.data.len()
                ),
            )));
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
