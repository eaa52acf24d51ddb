use std::io::Write;

use pagestore::{Journal, LogKind, LogRecord, PageID, Result, TransactionID, RECORD_SIZE};

fn slot_image(fill: u8) -> Vec<u8> {
    vec![fill; RECORD_SIZE]
}

#[test]
fn test_journal_counts_by_kind() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut journal = Journal::open(&dir.path().join("store.log"))?;

    let txn = TransactionID(1);
    journal.append(LogRecord::Begin { txn });
    journal.append(LogRecord::Insert {
        txn,
        page: PageID(0),
        slot: 0,
        before: slot_image(0),
        after: slot_image(1),
    });
    journal.append(LogRecord::Commit { txn });

    assert_eq!(journal.records_of_type(LogKind::Begin), 1);
    assert_eq!(journal.records_of_type(LogKind::Insert), 1);
    assert_eq!(journal.records_of_type(LogKind::Commit), 1);
    assert_eq!(journal.records_of_type(LogKind::Rollback), 0);
    assert_eq!(journal.total_records(), 3);
    Ok(())
}

#[test]
fn test_append_buffers_until_flush() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.log");
    let mut journal = Journal::open(&path)?;

    journal.append(LogRecord::Begin {
        txn: TransactionID(1),
    });
    assert_eq!(journal.buffered(), 1);
    assert!(journal.read_all()?.is_empty());

    journal.flush()?;
    assert_eq!(journal.buffered(), 0);
    assert_eq!(journal.read_all()?.len(), 1);
    Ok(())
}

#[test]
fn test_log_roundtrip_with_images() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut journal = Journal::open(&dir.path().join("store.log"))?;

    let txn = TransactionID(7);
    let records = vec![
        LogRecord::Begin { txn },
        LogRecord::Insert {
            txn,
            page: PageID(3),
            slot: 14,
            before: slot_image(0),
            after: slot_image(0xAB),
        },
        LogRecord::Update {
            txn,
            page: PageID(3),
            slot: 14,
            before: slot_image(0xAB),
            after: slot_image(0xCD),
        },
        LogRecord::Commit { txn },
        LogRecord::Checkpoint {
            txn: TransactionID(0),
        },
    ];
    for record in &records {
        journal.append(record.clone());
    }
    journal.flush()?;

    assert_eq!(journal.read_all()?, records);
    Ok(())
}

#[test]
fn test_clear_buffer_drops_unflushed_records() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut journal = Journal::open(&dir.path().join("store.log"))?;

    journal.append(LogRecord::Begin {
        txn: TransactionID(1),
    });
    journal.clear_buffer();
    journal.flush()?;

    assert!(journal.read_all()?.is_empty());
    Ok(())
}

#[test]
fn test_malformed_line_ends_the_scan() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.log");
    let mut journal = Journal::open(&path)?;

    journal.append(LogRecord::Begin {
        txn: TransactionID(1),
    });
    journal.append(LogRecord::Commit {
        txn: TransactionID(1),
    });
    journal.flush()?;

    // Corrupt the tail, then append one more valid-looking line.
    {
        let mut raw = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(raw, "garbage without pipes").unwrap();
        writeln!(raw, "2|BEGIN|-1|-1").unwrap();
    }

    // Everything from the malformed line on is ignored.
    let records = journal.read_all()?;
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[1],
        LogRecord::Commit {
            txn: TransactionID(1)
        }
    );
    Ok(())
}

#[test]
fn test_truncated_image_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.log");

    {
        let mut raw = std::fs::File::create(&path).unwrap();
        // INSERT whose images are only four bytes instead of a full slot.
        writeln!(raw, "1|INSERT|0|0|deadbeef|deadbeef").unwrap();
    }

    let mut journal = Journal::open(&path)?;
    assert!(journal.read_all()?.is_empty());
    Ok(())
}
