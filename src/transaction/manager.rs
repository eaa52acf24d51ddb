use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::buffer::BufferPool;
use crate::common::{
    PageID, RecordID, RecordKey, Result, StoreError, TransactionID, PAGE_SIZE, RECORDS_PER_PAGE,
    RECORD_SIZE,
};
use crate::log_mod::{Journal, LogRecord};
use crate::storage::Pager;

#[derive(Debug, Clone, Copy)]
enum TxnState {
    Idle,
    Active {
        id: TransactionID,
        /// End of the transaction's data as it would be after commit.
        /// Inserts position against this instead of the file length, so
        /// nothing reaches the data file before commit.
        logical_length: u64,
    },
}

/// Tracks the single active transaction and mediates every record
/// operation: pinning frames, capturing before-images on first touch,
/// journaling, and driving commit/rollback/checkpoint/recovery.
pub struct TransactionManager {
    pager: Arc<Mutex<Pager>>,
    pool: Arc<Mutex<BufferPool>>,
    journal: Arc<Mutex<Journal>>,
    state: TxnState,
    next_txn_id: u64,
    before_images: HashMap<PageID, Vec<u8>>,
    locks: HashSet<RecordKey>,
}

impl TransactionManager {
    pub fn new(
        pager: Arc<Mutex<Pager>>,
        pool: Arc<Mutex<BufferPool>>,
        journal: Arc<Mutex<Journal>>,
    ) -> Self {
        Self {
            pager,
            pool,
            journal,
            state: TxnState::Idle,
            next_txn_id: 0,
            before_images: HashMap::new(),
            locks: HashSet::new(),
        }
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.state, TxnState::Active { .. })
    }

    /// Append a record at the current end. Inside a transaction the write
    /// stays in the buffer and persistence is deferred to commit; outside
    /// one it is forced to disk immediately.
    pub fn insert_record(&mut self, value: &str) -> Result<()> {
        let fixed = fixed_record(value);
        let base = match self.state {
            TxnState::Active { logical_length, .. } => logical_length,
            TxnState::Idle => self.pager.lock().unwrap().length()?,
        };
        let (page_id, slot, new_end) = append_position(base);

        let guard = self.pool.lock().unwrap().fix(page_id)?;
        {
            let mut frame = guard.frame();
            if let TxnState::Active { id, .. } = self.state {
                self.prepare_write(id, page_id, slot, frame.data(), &fixed, false);
            }
            let lo = slot as usize * RECORD_SIZE;
            frame.data_mut()[lo..lo + RECORD_SIZE].copy_from_slice(&fixed);
            if self.in_transaction() {
                frame.set_transactional(true);
            }
        }
        self.pool.lock().unwrap().mark_dirty(page_id);

        match &mut self.state {
            TxnState::Active { logical_length, .. } => {
                if new_end > *logical_length {
                    *logical_length = new_end;
                }
            }
            TxnState::Idle => {
                self.pool.lock().unwrap().force(page_id)?;
                self.pager.lock().unwrap().set_length(new_end)?;
            }
        }
        Ok(())
    }

    /// Place the record in the first all-zero slot, scanning from page 0.
    /// Outside a transaction the page is forced; the file only ever grows
    /// here, so filling a hole never discards records after it.
    pub fn insert_record_sync(&mut self, value: &str) -> Result<()> {
        let fixed = fixed_record(value);
        let prior_length = self.pager.lock().unwrap().length()?;
        let mut page_index = 0u64;
        loop {
            let page_id = PageID(page_index);
            let guard = self.pool.lock().unwrap().fix(page_id)?;
            let slot = first_empty_slot(guard.frame().data());
            let Some(slot) = slot else {
                page_index += 1;
                continue;
            };
            {
                let mut frame = guard.frame();
                if let TxnState::Active { id, .. } = self.state {
                    self.prepare_write(id, page_id, slot, frame.data(), &fixed, false);
                }
                let lo = slot as usize * RECORD_SIZE;
                frame.data_mut()[lo..lo + RECORD_SIZE].copy_from_slice(&fixed);
                if self.in_transaction() {
                    frame.set_transactional(true);
                }
            }
            self.pool.lock().unwrap().mark_dirty(page_id);

            let new_end = page_id.0 * PAGE_SIZE as u64 + (slot + 1) * RECORD_SIZE as u64;
            match &mut self.state {
                TxnState::Active { logical_length, .. } => {
                    if new_end > *logical_length {
                        *logical_length = new_end;
                    }
                }
                TxnState::Idle => {
                    self.pool.lock().unwrap().force(page_id)?;
                    self.pager
                        .lock()
                        .unwrap()
                        .set_length(new_end.max(prior_length))?;
                }
            }
            return Ok(());
        }
    }

    /// Overwrite the record at `id`. Only meaningful inside a transaction.
    pub fn update_record(&mut self, id: RecordID, value: &str) -> Result<()> {
        let TxnState::Active { id: txn, .. } = self.state else {
            return Err(StoreError::TransactionRequired);
        };
        let page_id = id.page();
        let slot = id.slot();
        if !self.reachable(page_id, id.offset())? {
            return Err(StoreError::RecordOutOfBounds(id.0));
        }
        let fixed = fixed_record(value);

        let guard = self.pool.lock().unwrap().fix(page_id)?;
        {
            let mut frame = guard.frame();
            self.prepare_write(txn, page_id, slot, frame.data(), &fixed, true);
            let lo = slot as usize * RECORD_SIZE;
            frame.data_mut()[lo..lo + RECORD_SIZE].copy_from_slice(&fixed);
            frame.set_transactional(true);
        }
        self.pool.lock().unwrap().mark_dirty(page_id);
        Ok(())
    }

    /// Read the record at `id`, stripping the zero padding.
    ///
    /// Within a transaction a record the transaction itself has written
    /// still reads as its pre-transaction value, served from the
    /// before-image snapshot.
    pub fn read_record(&mut self, id: RecordID) -> Result<String> {
        let page_id = id.page();
        let slot = id.slot();
        let offset = id.offset();
        let lo = slot as usize * RECORD_SIZE;

        if self.in_transaction() && self.locks.contains(&RecordKey::new(page_id, slot)) {
            if let Some(image) = self.before_images.get(&page_id) {
                let window = image[lo..lo + RECORD_SIZE].to_vec();
                return self.finish_read(window, offset);
            }
        }

        let file_len = self.pager.lock().unwrap().length()?;
        if !self.pool.lock().unwrap().contains(page_id)
            && offset + RECORD_SIZE as u64 > file_len
        {
            return Err(StoreError::RecordOutOfBounds(id.0));
        }
        let guard = self.pool.lock().unwrap().fix(page_id)?;
        let window = guard.frame().data()[lo..lo + RECORD_SIZE].to_vec();
        drop(guard);
        self.finish_read(window, offset)
    }

    /// The records stored in page `p`, truncated to the total record
    /// count. At most `RECORDS_PER_PAGE` entries.
    pub fn get_page(&mut self, page_id: PageID) -> Result<Vec<String>> {
        let file_len = self.pager.lock().unwrap().length()?;
        if page_id.0 * PAGE_SIZE as u64 >= file_len {
            return Ok(Vec::new());
        }
        let total = record_count_for(file_len);
        let first = page_id.0 * RECORDS_PER_PAGE as u64;
        if first >= total {
            return Ok(Vec::new());
        }
        let count = (RECORDS_PER_PAGE as u64).min(total - first) as usize;

        let guard = self.pool.lock().unwrap().fix(page_id)?;
        let frame = guard.frame();
        let mut records = Vec::with_capacity(count);
        for slot in 0..count {
            let lo = slot * RECORD_SIZE;
            let trimmed = trim_zeros(&frame.data()[lo..lo + RECORD_SIZE]);
            records.push(String::from_utf8_lossy(trimmed).into_owned());
        }
        Ok(records)
    }

    pub fn record_count(&self) -> Result<u64> {
        let len = self.pager.lock().unwrap().length()?;
        Ok(record_count_for(len))
    }

    pub fn page_count(&self) -> Result<u64> {
        let len = self.pager.lock().unwrap().length()?;
        Ok(len.div_ceil(PAGE_SIZE as u64))
    }

    /// Start a transaction. An already-active transaction is committed
    /// first.
    pub fn begin(&mut self) -> Result<TransactionID> {
        if self.in_transaction() {
            self.commit()?;
        }
        self.next_txn_id += 1;
        let id = TransactionID(self.next_txn_id);
        let logical_length = self.pager.lock().unwrap().length()?;
        self.journal
            .lock()
            .unwrap()
            .append(LogRecord::Begin { txn: id });
        self.state = TxnState::Active { id, logical_length };
        debug!("begin transaction {}", id.0);
        Ok(id)
    }

    /// Make the transaction durable. Only the journal is flushed; dirty
    /// data pages stay in the buffer until a checkpoint or recovery. The
    /// data file is zero-extended to the committed logical end so record
    /// counts and later appends see the committed extent.
    pub fn commit(&mut self) -> Result<()> {
        let TxnState::Active { id, logical_length } = self.state else {
            return Ok(());
        };
        {
            let mut journal = self.journal.lock().unwrap();
            journal.append(LogRecord::Commit { txn: id });
            journal.flush()?;
        }
        {
            let mut pager = self.pager.lock().unwrap();
            if logical_length > pager.length()? {
                pager.set_length(logical_length)?;
            }
        }
        self.pool.lock().unwrap().clear_transactional();
        self.before_images.clear();
        self.locks.clear();
        self.state = TxnState::Idle;
        debug!("commit transaction {}", id.0);
        Ok(())
    }

    /// Undo the transaction by restoring every cached before-image into
    /// its frame, then journal the rollback.
    pub fn rollback(&mut self) -> Result<()> {
        let TxnState::Active { id, .. } = self.state else {
            return Ok(());
        };
        let images: Vec<(PageID, Vec<u8>)> = self.before_images.drain().collect();
        for (page_id, image) in images {
            let guard = self.pool.lock().unwrap().fix(page_id)?;
            let mut frame = guard.frame();
            frame.data_mut().copy_from_slice(&image);
            frame.set_dirty(false);
            frame.set_transactional(false);
        }
        {
            let mut journal = self.journal.lock().unwrap();
            journal.append(LogRecord::Rollback { txn: id });
            journal.flush()?;
        }
        self.locks.clear();
        self.state = TxnState::Idle;
        debug!("rollback transaction {}", id.0);
        Ok(())
    }

    /// Flush every dirty frame to the data file, trim the file tail to
    /// the last occupied slot, and journal the checkpoint marker.
    pub fn checkpoint(&mut self) -> Result<()> {
        let flushed = self.pool.lock().unwrap().flush_dirty()?;
        self.trim_tail()?;
        let txn = match self.state {
            TxnState::Active { id, .. } => id,
            TxnState::Idle => TransactionID(0),
        };
        {
            let mut journal = self.journal.lock().unwrap();
            journal.append(LogRecord::Checkpoint { txn });
            journal.flush()?;
        }
        info!("checkpoint: {} page(s) flushed", flushed);
        Ok(())
    }

    /// Simulate a power loss: every frame, the before-image cache, the
    /// lock set, the unflushed journal buffer and the transaction state
    /// are discarded. Nothing is written.
    pub fn crash(&mut self) {
        self.pool.lock().unwrap().clear();
        self.journal.lock().unwrap().clear_buffer();
        self.before_images.clear();
        self.locks.clear();
        self.state = TxnState::Idle;
        info!("crash: volatile state discarded");
    }

    /// Replay the journal: REDO committed changes after the last
    /// checkpoint in forward order, UNDO uncommitted ones in reverse
    /// order, then trim the file tail and drop every frame so reads see
    /// the recovered on-disk state.
    pub fn recover(&mut self) -> Result<()> {
        let records = self.journal.lock().unwrap().read_all()?;
        if records.is_empty() {
            self.pool.lock().unwrap().clear();
            return Ok(());
        }

        let mut begun: HashSet<TransactionID> = HashSet::new();
        let mut committed: HashSet<TransactionID> = HashSet::new();
        let mut last_checkpoint = None;
        for (index, record) in records.iter().enumerate() {
            match record {
                LogRecord::Begin { txn } => {
                    begun.insert(*txn);
                }
                LogRecord::Commit { txn } => {
                    committed.insert(*txn);
                }
                LogRecord::Checkpoint { .. } => last_checkpoint = Some(index),
                _ => {}
            }
        }
        let start = last_checkpoint.map_or(0, |index| index + 1);

        let mut redone = 0u64;
        for record in &records[start..] {
            if committed.contains(&record.txn()) {
                if let Some((page, slot, _, after)) = record.images() {
                    self.apply_image(page, slot, after)?;
                    redone += 1;
                }
            }
        }

        let mut undone = 0u64;
        for record in records[start..].iter().rev() {
            let txn = record.txn();
            if begun.contains(&txn) && !committed.contains(&txn) {
                if let Some((page, slot, before, _)) = record.images() {
                    self.apply_image(page, slot, before)?;
                    undone += 1;
                }
            }
        }

        self.trim_tail()?;
        self.pool.lock().unwrap().clear();
        info!("recovery: {} redo, {} undo record(s)", redone, undone);
        Ok(())
    }

    /// First-touch protocol for a transactional write of (page, slot):
    /// take the record lock, snapshot the page on its first touch, and
    /// journal the before/after images.
    fn prepare_write(
        &mut self,
        txn: TransactionID,
        page_id: PageID,
        slot: u64,
        frame_data: &[u8],
        after: &[u8],
        is_update: bool,
    ) {
        let key = RecordKey::new(page_id, slot);
        if !self.locks.contains(&key) {
            self.locks.insert(key);
            self.before_images
                .entry(page_id)
                .or_insert_with(|| frame_data.to_vec());
        }
        let lo = slot as usize * RECORD_SIZE;
        let before = frame_data[lo..lo + RECORD_SIZE].to_vec();
        let after = after.to_vec();
        let record = if is_update {
            LogRecord::Update {
                txn,
                page: page_id,
                slot,
                before,
                after,
            }
        } else {
            LogRecord::Insert {
                txn,
                page: page_id,
                slot,
                before,
                after,
            }
        };
        self.journal.lock().unwrap().append(record);
    }

    /// A record is reachable when its page is buffered or the slot lies
    /// within the persisted file.
    fn reachable(&self, page_id: PageID, offset: u64) -> Result<bool> {
        if self.pool.lock().unwrap().contains(page_id) {
            return Ok(true);
        }
        Ok(offset + RECORD_SIZE as u64 <= self.pager.lock().unwrap().length()?)
    }

    fn finish_read(&mut self, window: Vec<u8>, offset: u64) -> Result<String> {
        let trimmed = trim_zeros(&window);
        if trimmed.is_empty() {
            // The buffered slot may be empty while the on-disk copy is not.
            let mut pager = self.pager.lock().unwrap();
            if offset + RECORD_SIZE as u64 <= pager.length()? {
                let page = pager.read_page(PageID(offset / PAGE_SIZE as u64))?;
                let lo = (offset % PAGE_SIZE as u64) as usize;
                let direct = trim_zeros(&page[lo..lo + RECORD_SIZE]);
                return Ok(String::from_utf8_lossy(direct).into_owned());
            }
        }
        Ok(String::from_utf8_lossy(trimmed).into_owned())
    }

    fn apply_image(&mut self, page_id: PageID, slot: u64, image: &[u8]) -> Result<()> {
        let mut pool = self.pool.lock().unwrap();
        let guard = pool.fix(page_id)?;
        {
            let mut frame = guard.frame();
            let lo = slot as usize * RECORD_SIZE;
            frame.data_mut()[lo..lo + RECORD_SIZE].copy_from_slice(image);
            frame.set_dirty(true);
        }
        drop(guard);
        pool.force(page_id)
    }

    /// Shrink the file length to the end of the last non-empty slot,
    /// scanning pages backward. The length only ever decreases here.
    fn trim_tail(&mut self) -> Result<()> {
        let mut pager = self.pager.lock().unwrap();
        let len = pager.length()?;
        if len == 0 {
            return Ok(());
        }
        let pages = len.div_ceil(PAGE_SIZE as u64);
        for page_index in (0..pages).rev() {
            let data = pager.read_page(PageID(page_index))?;
            for slot in (0..RECORDS_PER_PAGE).rev() {
                let lo = slot * RECORD_SIZE;
                if data[lo..lo + RECORD_SIZE].iter().any(|b| *b != 0) {
                    let end =
                        page_index * PAGE_SIZE as u64 + (slot as u64 + 1) * RECORD_SIZE as u64;
                    if end < len {
                        pager.set_length(end)?;
                    }
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

/// Encode `value` into a fixed-width slot: UTF-8 bytes truncated at
/// `RECORD_SIZE`, right-padded with zeros.
fn fixed_record(value: &str) -> Vec<u8> {
    let mut fixed = vec![0u8; RECORD_SIZE];
    let bytes = value.as_bytes();
    let len = bytes.len().min(RECORD_SIZE);
    fixed[..len].copy_from_slice(&bytes[..len]);
    fixed
}

fn trim_zeros(window: &[u8]) -> &[u8] {
    let end = window.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &window[..end]
}

fn record_count_for(len: u64) -> u64 {
    let full_pages = len / PAGE_SIZE as u64;
    let remainder = len % PAGE_SIZE as u64;
    full_pages * RECORDS_PER_PAGE as u64 + remainder / RECORD_SIZE as u64
}

/// Where the next appended record goes, given the current (logical or
/// file) length: if the record would straddle the page boundary, skip to
/// the start of the next page. Returns (page, slot, end offset of the
/// slot).
fn append_position(mut length: u64) -> (PageID, u64, u64) {
    let page_size = PAGE_SIZE as u64;
    let record_size = RECORD_SIZE as u64;
    let offset_in_page = length % page_size;
    if offset_in_page + record_size > page_size {
        length += page_size - offset_in_page;
    }
    let page = PageID(length / page_size);
    let slot = (length % page_size) / record_size;
    let end = page.0 * page_size + (slot + 1) * record_size;
    (page, slot, end)
}

fn first_empty_slot(data: &[u8]) -> Option<u64> {
    (0..RECORDS_PER_PAGE)
        .find(|&slot| {
            let lo = slot * RECORD_SIZE;
            data[lo..lo + RECORD_SIZE].iter().all(|b| *b == 0)
        })
        .map(|slot| slot as u64)
}
