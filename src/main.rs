use env_logger::Builder;
use log::{info, LevelFilter};

use pagestore::{Database, PageID, RecordID};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::new().filter_level(LevelFilter::Info).init();

    let dir = std::env::temp_dir().join("pagestore-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("etudiants.db");
    // Start from a clean slate each run.
    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(dir.join("etudiants.db.log"));

    let mut db = Database::open(&path)?;

    info!("-- rollback --");
    db.begin()?;
    db.insert_record("Etudiant 200")?;
    db.insert_record("Etudiant 201")?;
    db.rollback()?;
    info!("records after rollback: {}", db.record_count()?);
    info!("page 0 after rollback: {:?}", db.get_page(PageID(0))?);

    info!("-- commit --");
    db.begin()?;
    db.insert_record("Etudiant 202")?;
    db.insert_record("Etudiant 203")?;
    db.commit()?;
    for i in 0..db.record_count()? {
        info!("record {}: {}", i, db.read_record(RecordID(i))?);
    }

    info!("-- crash and recovery --");
    db.checkpoint()?;
    db.begin()?;
    db.insert_record("Etudiant fantome")?;
    db.crash();
    db.recover()?;
    info!("records after recovery: {}", db.record_count()?);
    for i in 0..db.record_count()? {
        info!("record {}: {}", i, db.read_record(RecordID(i))?);
    }

    db.close()?;
    Ok(())
}
