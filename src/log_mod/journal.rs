use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, warn};

use crate::common::{PageID, Result, StoreError, TransactionID, RECORD_SIZE};

/// Discriminant of a log record, used for counting and for the on-disk
/// type token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Begin,
    Insert,
    Update,
    Commit,
    Rollback,
    Checkpoint,
}

impl LogKind {
    fn as_str(&self) -> &'static str {
        match self {
            LogKind::Begin => "BEGIN",
            LogKind::Insert => "INSERT",
            LogKind::Update => "UPDATE",
            LogKind::Commit => "COMMIT",
            LogKind::Rollback => "ROLLBACK",
            LogKind::Checkpoint => "CHECKPOINT",
        }
    }
}

/// One journal entry. Slotted variants carry the full before and after
/// images of the record so recovery can REDO and UNDO without consulting
/// the data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Begin {
        txn: TransactionID,
    },
    Insert {
        txn: TransactionID,
        page: PageID,
        slot: u64,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    Update {
        txn: TransactionID,
        page: PageID,
        slot: u64,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    Commit {
        txn: TransactionID,
    },
    Rollback {
        txn: TransactionID,
    },
    /// `txn` is 0 when no transaction was active at checkpoint time.
    Checkpoint {
        txn: TransactionID,
    },
}

impl LogRecord {
    pub fn kind(&self) -> LogKind {
        match self {
            LogRecord::Begin { .. } => LogKind::Begin,
            LogRecord::Insert { .. } => LogKind::Insert,
            LogRecord::Update { .. } => LogKind::Update,
            LogRecord::Commit { .. } => LogKind::Commit,
            LogRecord::Rollback { .. } => LogKind::Rollback,
            LogRecord::Checkpoint { .. } => LogKind::Checkpoint,
        }
    }

    pub fn txn(&self) -> TransactionID {
        match self {
            LogRecord::Begin { txn }
            | LogRecord::Insert { txn, .. }
            | LogRecord::Update { txn, .. }
            | LogRecord::Commit { txn }
            | LogRecord::Rollback { txn }
            | LogRecord::Checkpoint { txn } => *txn,
        }
    }

    /// Page, slot and images for the slotted variants.
    pub fn images(&self) -> Option<(PageID, u64, &[u8], &[u8])> {
        match self {
            LogRecord::Insert {
                page,
                slot,
                before,
                after,
                ..
            }
            | LogRecord::Update {
                page,
                slot,
                before,
                after,
                ..
            } => Some((*page, *slot, before, after)),
            _ => None,
        }
    }

    /// On-disk line: `txn|TYPE|page|slot` with `|before|after` hex images
    /// appended for the slotted types. Page and slot are -1 when absent.
    fn encode(&self) -> String {
        match self {
            LogRecord::Insert {
                txn,
                page,
                slot,
                before,
                after,
            }
            | LogRecord::Update {
                txn,
                page,
                slot,
                before,
                after,
            } => format!(
                "{}|{}|{}|{}|{}|{}",
                txn.0,
                self.kind().as_str(),
                page.0,
                slot,
                hex::encode(before),
                hex::encode(after)
            ),
            _ => format!("{}|{}|-1|-1", self.txn().0, self.kind().as_str()),
        }
    }

    fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 4 {
            return Err(StoreError::LogParse(format!(
                "expected at least 4 fields, got {}",
                parts.len()
            )));
        }
        let txn = TransactionID(
            parts[0]
                .parse::<u64>()
                .map_err(|_| StoreError::LogParse(format!("bad transaction id {:?}", parts[0])))?,
        );
        match parts[1] {
            "BEGIN" => Ok(LogRecord::Begin { txn }),
            "COMMIT" => Ok(LogRecord::Commit { txn }),
            "ROLLBACK" => Ok(LogRecord::Rollback { txn }),
            "CHECKPOINT" => Ok(LogRecord::Checkpoint { txn }),
            "INSERT" | "UPDATE" => {
                if parts.len() < 6 {
                    return Err(StoreError::LogParse(format!(
                        "{} record is missing its images",
                        parts[1]
                    )));
                }
                let page = parts[2]
                    .parse::<i64>()
                    .ok()
                    .filter(|p| *p >= 0)
                    .ok_or_else(|| StoreError::LogParse(format!("bad page index {:?}", parts[2])))?;
                let slot = parts[3]
                    .parse::<i64>()
                    .ok()
                    .filter(|s| *s >= 0)
                    .ok_or_else(|| StoreError::LogParse(format!("bad slot index {:?}", parts[3])))?;
                let before = decode_image(parts[4])?;
                let after = decode_image(parts[5])?;
                let page = PageID(page as u64);
                let slot = slot as u64;
                if parts[1] == "INSERT" {
                    Ok(LogRecord::Insert {
                        txn,
                        page,
                        slot,
                        before,
                        after,
                    })
                } else {
                    Ok(LogRecord::Update {
                        txn,
                        page,
                        slot,
                        before,
                        after,
                    })
                }
            }
            other => Err(StoreError::LogParse(format!("unknown record type {:?}", other))),
        }
    }
}

fn decode_image(field: &str) -> Result<Vec<u8>> {
    let image =
        hex::decode(field).map_err(|e| StoreError::LogParse(format!("bad image hex: {}", e)))?;
    if image.len() != RECORD_SIZE {
        return Err(StoreError::LogParse(format!(
            "image is {} bytes, expected {}",
            image.len(),
            RECORD_SIZE
        )));
    }
    Ok(image)
}

/// Owns the append-only log file and the in-memory record buffer that
/// accumulates between begin and commit/rollback. The file is never
/// truncated.
pub struct Journal {
    file: File,
    buffer: Vec<LogRecord>,
    record_counts: HashMap<LogKind, u64>,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            file,
            buffer: Vec::new(),
            record_counts: HashMap::new(),
        })
    }

    /// Queue a record in the in-memory buffer. Nothing reaches disk until
    /// [`Journal::flush`].
    pub fn append(&mut self, record: LogRecord) {
        *self.record_counts.entry(record.kind()).or_insert(0) += 1;
        self.buffer.push(record);
    }

    /// Write every buffered record at end-of-file and sync. This is the
    /// durability point for commit, rollback and checkpoint.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut batch = String::new();
        for record in &self.buffer {
            batch.push_str(&record.encode());
            batch.push('\n');
        }
        self.file.write_all(batch.as_bytes())?;
        self.file.sync_data()?;
        debug!("journal flush: {} record(s)", self.buffer.len());
        self.buffer.clear();
        Ok(())
    }

    /// Drop buffered records without writing them. Used by the crash
    /// simulation: the buffer is volatile memory.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Parse every record currently on disk, in order. Parsing is
    /// best-effort: the first malformed line and everything after it are
    /// ignored.
    pub fn read_all(&mut self) -> Result<Vec<LogRecord>> {
        let mut content = String::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_string(&mut content)?;

        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match LogRecord::parse(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("stopping log scan at malformed line: {}", e);
                    break;
                }
            }
        }
        Ok(records)
    }

    /// How many records of `kind` have been appended since this journal
    /// was opened.
    pub fn records_of_type(&self, kind: LogKind) -> u64 {
        *self.record_counts.get(&kind).unwrap_or(&0)
    }

    pub fn total_records(&self) -> u64 {
        self.record_counts.values().sum()
    }
}
