//! # pagestore
//!
//! A single-file record store with a fixed-size page layout, a pinning
//! buffer pool, single-transaction semantics protected by before-images
//! and record locks, and crash recovery driven by an append-only journal.

pub mod buffer;
pub mod common;
pub mod log_mod;
pub mod storage;
pub mod transaction;

pub use buffer::{BufferPool, Frame, PageGuard};
pub use common::{
    PageID, RecordID, RecordKey, Result, StoreError, TransactionID, PAGE_SIZE, RECORDS_PER_PAGE,
    RECORD_SIZE,
};
pub use log_mod::{Journal, LogKind, LogRecord};
pub use storage::Pager;
pub use transaction::TransactionManager;

use std::ffi::OsString;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// The top-level store: owns the data file, the journal (at the data
/// file's path with `.log` appended), the buffer pool, and the
/// transaction manager that every operation goes through.
pub struct Database {
    journal: Arc<Mutex<Journal>>,
    manager: TransactionManager,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut log_path = OsString::from(path.as_os_str());
        log_path.push(".log");

        let pager = Arc::new(Mutex::new(Pager::open(path)?));
        let journal = Arc::new(Mutex::new(Journal::open(Path::new(&log_path))?));
        let pool = Arc::new(Mutex::new(BufferPool::new(Arc::clone(&pager))));
        let manager = TransactionManager::new(pager, pool, Arc::clone(&journal));

        Ok(Self { journal, manager })
    }

    /// Shared handle to the journal, for inspection.
    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        Arc::clone(&self.journal)
    }

    pub fn insert_record(&mut self, value: &str) -> Result<()> {
        self.manager.insert_record(value)
    }

    pub fn insert_record_sync(&mut self, value: &str) -> Result<()> {
        self.manager.insert_record_sync(value)
    }

    pub fn update_record(&mut self, id: RecordID, value: &str) -> Result<()> {
        self.manager.update_record(id, value)
    }

    pub fn read_record(&mut self, id: RecordID) -> Result<String> {
        self.manager.read_record(id)
    }

    pub fn get_page(&mut self, page_id: PageID) -> Result<Vec<String>> {
        self.manager.get_page(page_id)
    }

    pub fn record_count(&self) -> Result<u64> {
        self.manager.record_count()
    }

    pub fn page_count(&self) -> Result<u64> {
        self.manager.page_count()
    }

    pub fn in_transaction(&self) -> bool {
        self.manager.in_transaction()
    }

    pub fn begin(&mut self) -> Result<TransactionID> {
        self.manager.begin()
    }

    pub fn commit(&mut self) -> Result<()> {
        self.manager.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.manager.rollback()
    }

    pub fn checkpoint(&mut self) -> Result<()> {
        self.manager.checkpoint()
    }

    pub fn crash(&mut self) {
        self.manager.crash()
    }

    pub fn recover(&mut self) -> Result<()> {
        self.manager.recover()
    }

    /// Close the store. Durability rests on the journal, so nothing is
    /// flushed here; the file handles close on drop.
    pub fn close(self) -> Result<()> {
        Ok(())
    }
}
