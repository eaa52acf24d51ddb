mod error;
pub use error::*;

mod rid;
pub use rid::RecordKey;

/// Size of a page in bytes, the unit of disk I/O.
pub const PAGE_SIZE: usize = 4096;

/// Size of a record slot in bytes. Records are fixed width.
pub const RECORD_SIZE: usize = 100;

/// Records per page. The final `PAGE_SIZE % RECORD_SIZE` bytes of every
/// page are padding and are never written.
pub const RECORDS_PER_PAGE: usize = PAGE_SIZE / RECORD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PageID(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TransactionID(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RecordID(pub u64);

impl RecordID {
    /// Page holding this record.
    pub fn page(&self) -> PageID {
        PageID(self.0 / RECORDS_PER_PAGE as u64)
    }

    /// Slot index inside the page.
    pub fn slot(&self) -> u64 {
        self.0 % RECORDS_PER_PAGE as u64
    }

    /// Absolute byte offset of the record in the data file.
    pub fn offset(&self) -> u64 {
        self.page().0 * PAGE_SIZE as u64 + self.slot() * RECORD_SIZE as u64
    }
}
