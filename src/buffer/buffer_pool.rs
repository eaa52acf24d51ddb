use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::common::{PageID, Result, PAGE_SIZE};
use crate::storage::Pager;

/// In-memory mirror of a page plus its bookkeeping state.
pub struct Frame {
    data: Vec<u8>,
    dirty: bool,
    pin_count: u32,
    transactional: bool,
}

impl Frame {
    fn new(data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self {
            data,
            dirty: false,
            pin_count: 0,
            transactional: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    pub fn set_transactional(&mut self, transactional: bool) {
        self.transactional = transactional;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    fn pin(&mut self) {
        self.pin_count += 1;
    }

    fn unpin(&mut self) {
        if self.pin_count > 0 {
            self.pin_count -= 1;
        }
    }
}

/// RAII pin on a buffer frame. The pin taken by [`BufferPool::fix`] is
/// released when the guard drops, so every exit path unfixes the page.
/// Callers must not retain frame references past the guard.
pub struct PageGuard {
    page_id: PageID,
    frame: Arc<Mutex<Frame>>,
}

impl PageGuard {
    pub fn page_id(&self) -> PageID {
        self.page_id
    }

    /// Lock the frame for reading or mutation.
    pub fn frame(&self) -> MutexGuard<'_, Frame> {
        self.frame.lock().unwrap()
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        self.frame.lock().unwrap().unpin();
    }
}

/// Maps page ids to in-memory frames. Misses fetch through the pager.
/// There is no eviction: frames live until [`BufferPool::clear`] or
/// process shutdown.
pub struct BufferPool {
    frames: HashMap<PageID, Arc<Mutex<Frame>>>,
    pager: Arc<Mutex<Pager>>,
}

impl BufferPool {
    pub fn new(pager: Arc<Mutex<Pager>>) -> Self {
        Self {
            frames: HashMap::new(),
            pager,
        }
    }

    /// FIX: load the page into a frame if absent, pin it, and return the
    /// pin guard.
    pub fn fix(&mut self, page_id: PageID) -> Result<PageGuard> {
        let frame = match self.frames.get(&page_id) {
            Some(frame) => Arc::clone(frame),
            None => {
                let data = self.pager.lock().unwrap().read_page(page_id)?;
                let frame = Arc::new(Mutex::new(Frame::new(data)));
                self.frames.insert(page_id, Arc::clone(&frame));
                frame
            }
        };
        frame.lock().unwrap().pin();
        Ok(PageGuard { page_id, frame })
    }

    pub fn contains(&self, page_id: PageID) -> bool {
        self.frames.contains_key(&page_id)
    }

    /// USE: mark the frame modified. A FIX alone never implies mutation.
    pub fn mark_dirty(&mut self, page_id: PageID) {
        if let Some(frame) = self.frames.get(&page_id) {
            frame.lock().unwrap().set_dirty(true);
        }
    }

    /// FORCE: write the frame through the pager if dirty, then clear the
    /// dirty flag.
    pub fn force(&mut self, page_id: PageID) -> Result<()> {
        if let Some(frame) = self.frames.get(&page_id) {
            let mut frame = frame.lock().unwrap();
            if frame.is_dirty() {
                self.pager.lock().unwrap().write_page(page_id, frame.data())?;
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Checkpoint sweep: force every dirty frame. Returns how many pages
    /// were written.
    pub fn flush_dirty(&mut self) -> Result<usize> {
        let mut written = 0;
        let mut pager = self.pager.lock().unwrap();
        for (page_id, frame) in &self.frames {
            let mut frame = frame.lock().unwrap();
            if frame.is_dirty() {
                pager.write_page(*page_id, frame.data())?;
                frame.set_dirty(false);
                written += 1;
            }
        }
        if written > 0 {
            debug!("flushed {} dirty page(s)", written);
        }
        Ok(written)
    }

    /// Commit sweep: clear the transactional flag on every frame without
    /// touching the dirty state.
    pub fn clear_transactional(&mut self) {
        for frame in self.frames.values() {
            frame.lock().unwrap().set_transactional(false);
        }
    }

    /// Discard every frame, simulating the loss of volatile memory.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
