use std::sync::{Arc, Mutex};

use pagestore::{BufferPool, PageID, Pager, Result, PAGE_SIZE};

fn pool_over_memory() -> (Arc<Mutex<Pager>>, BufferPool) {
    let pager = Arc::new(Mutex::new(Pager::in_memory()));
    let pool = BufferPool::new(Arc::clone(&pager));
    (pager, pool)
}

#[test]
fn test_fix_loads_zero_page_past_eof() -> Result<()> {
    let (_pager, mut pool) = pool_over_memory();

    let guard = pool.fix(PageID(7))?;
    let frame = guard.frame();
    assert_eq!(frame.data().len(), PAGE_SIZE);
    assert!(frame.data().iter().all(|b| *b == 0));
    assert!(!frame.is_dirty());
    Ok(())
}

#[test]
fn test_pin_count_balanced_by_guard_drop() -> Result<()> {
    let (_pager, mut pool) = pool_over_memory();
    let page = PageID(0);

    let first = pool.fix(page)?;
    let second = pool.fix(page)?;
    assert_eq!(first.frame().pin_count(), 2);

    drop(second);
    assert_eq!(first.frame().pin_count(), 1);

    drop(first);
    let last = pool.fix(page)?;
    assert_eq!(last.frame().pin_count(), 1);
    Ok(())
}

#[test]
fn test_use_then_force_writes_through() -> Result<()> {
    let (pager, mut pool) = pool_over_memory();
    let page = PageID(2);

    {
        let guard = pool.fix(page)?;
        guard.frame().data_mut()[0] = 42;
    }
    pool.mark_dirty(page);
    pool.force(page)?;

    let data = pager.lock().unwrap().read_page(page)?;
    assert_eq!(data[0], 42);

    let guard = pool.fix(page)?;
    assert!(!guard.frame().is_dirty());
    Ok(())
}

#[test]
fn test_force_without_use_writes_nothing() -> Result<()> {
    let (pager, mut pool) = pool_over_memory();
    let page = PageID(0);

    {
        let guard = pool.fix(page)?;
        guard.frame().data_mut()[0] = 42;
    }
    // No mark_dirty: a FIX alone never implies mutation.
    pool.force(page)?;

    assert_eq!(pager.lock().unwrap().length()?, 0);
    Ok(())
}

#[test]
fn test_flush_dirty_sweeps_all_dirty_frames() -> Result<()> {
    let (pager, mut pool) = pool_over_memory();

    for index in 0..3u64 {
        let page = PageID(index);
        {
            let guard = pool.fix(page)?;
            guard.frame().data_mut()[0] = index as u8 + 1;
        }
        pool.mark_dirty(page);
    }
    // One clean page as well.
    let _ = pool.fix(PageID(3))?;

    assert_eq!(pool.flush_dirty()?, 3);
    assert_eq!(pager.lock().unwrap().read_page(PageID(2))?[0], 3);
    Ok(())
}

#[test]
fn test_clear_discards_unwritten_frames() -> Result<()> {
    let (_pager, mut pool) = pool_over_memory();
    let page = PageID(0);

    {
        let guard = pool.fix(page)?;
        guard.frame().data_mut()[0] = 99;
    }
    pool.mark_dirty(page);
    assert_eq!(pool.len(), 1);

    pool.clear();
    assert!(pool.is_empty());

    // The modification never reached disk, so the reloaded page is clean.
    let guard = pool.fix(page)?;
    assert_eq!(guard.frame().data()[0], 0);
    Ok(())
}

#[test]
fn test_clear_transactional_keeps_dirty() -> Result<()> {
    let (_pager, mut pool) = pool_over_memory();
    let page = PageID(1);

    {
        let guard = pool.fix(page)?;
        let mut frame = guard.frame();
        frame.set_transactional(true);
    }
    pool.mark_dirty(page);
    pool.clear_transactional();

    let guard = pool.fix(page)?;
    let frame = guard.frame();
    assert!(!frame.is_transactional());
    assert!(frame.is_dirty());
    Ok(())
}
