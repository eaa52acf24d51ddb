use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use pagestore::{Database, PageID, RecordID, Result, RECORDS_PER_PAGE, RECORD_SIZE};

fn open_store(dir: &tempfile::TempDir) -> Database {
    Database::open(dir.path().join("store.db")).unwrap()
}

#[test]
fn test_fill_and_read() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);

    for i in 1..=105 {
        db.insert_record(&format!("Etudiant {}", i))?;
    }

    assert_eq!(db.record_count()?, 105);
    assert_eq!(db.page_count()?, 3);
    assert_eq!(db.read_record(RecordID(41))?, "Etudiant 42");

    let page0 = db.get_page(PageID(0))?;
    assert_eq!(page0.len(), RECORDS_PER_PAGE);
    assert_eq!(page0[0], "Etudiant 1");
    assert_eq!(page0[39], "Etudiant 40");

    let page2 = db.get_page(PageID(2))?;
    assert_eq!(page2.len(), 25);
    assert_eq!(page2[0], "Etudiant 81");
    assert_eq!(page2[24], "Etudiant 105");

    assert!(db.get_page(PageID(3))?.is_empty());
    Ok(())
}

#[test]
fn test_exact_slot_size_value_roundtrips() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);

    let value = "x".repeat(RECORD_SIZE);
    db.insert_record(&value)?;
    assert_eq!(db.read_record(RecordID(0))?, value);
    Ok(())
}

#[test]
fn test_oversize_value_is_truncated() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);

    let value = "y".repeat(RECORD_SIZE + 1);
    db.insert_record(&value)?;
    assert_eq!(db.read_record(RecordID(0))?, value[..RECORD_SIZE].to_string());
    Ok(())
}

#[test]
fn test_append_advances_past_the_page_padding() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);

    for i in 0..=RECORDS_PER_PAGE as u64 {
        db.insert_record(&format!("record {}", i))?;
    }

    // Record 40 starts the second page; the 96-byte page tail is skipped.
    assert_eq!(db.page_count()?, 2);
    assert_eq!(
        db.read_record(RecordID(RECORDS_PER_PAGE as u64))?,
        format!("record {}", RECORDS_PER_PAGE)
    );
    assert_eq!(db.record_count()?, RECORDS_PER_PAGE as u64 + 1);
    Ok(())
}

#[test]
fn test_sync_insert_fills_first_hole_without_losing_the_tail() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);

    db.insert_record("A")?;
    db.insert_record("B")?;
    db.insert_record("C")?;

    // Zero out the middle slot to open a hole.
    db.begin()?;
    db.update_record(RecordID(1), "")?;
    db.commit()?;

    db.insert_record_sync("D")?;

    assert_eq!(db.record_count()?, 3);
    assert_eq!(db.read_record(RecordID(0))?, "A");
    assert_eq!(db.read_record(RecordID(1))?, "D");
    assert_eq!(db.read_record(RecordID(2))?, "C");
    Ok(())
}

#[test]
fn test_sync_insert_appends_when_no_hole_exists() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);

    db.insert_record("A")?;
    db.insert_record_sync("B")?;

    assert_eq!(db.record_count()?, 2);
    assert_eq!(db.read_record(RecordID(1))?, "B");
    Ok(())
}

#[test]
fn test_randomized_inserts_read_back() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);
    let mut rng = thread_rng();

    let mut expected = Vec::new();
    for _ in 0..100 {
        let len = rng.gen_range(1..=RECORD_SIZE);
        let value: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        db.insert_record(&value)?;
        expected.push(value);
    }

    assert_eq!(db.record_count()?, expected.len() as u64);
    for (i, value) in expected.iter().enumerate() {
        assert_eq!(&db.read_record(RecordID(i as u64))?, value);
    }
    Ok(())
}

#[test]
fn test_randomized_transaction_outcomes() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut db = open_store(&dir);
    let mut rng = thread_rng();

    let mut committed = 0u64;
    for round in 0..20 {
        let before = db.record_count()?;
        let inserts = rng.gen_range(1..=4u64);
        db.begin()?;
        for i in 0..inserts {
            db.insert_record(&format!("round {} insert {}", round, i))?;
        }
        if rng.gen_bool(0.5) {
            db.commit()?;
            committed += inserts;
        } else {
            db.rollback()?;
            assert_eq!(db.record_count()?, before);
        }
        assert_eq!(db.record_count()?, committed);
    }
    Ok(())
}
