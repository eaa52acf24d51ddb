use serde::{Deserialize, Serialize};

use crate::common::{PageID, RecordID};

/// Key identifying a record-level lock: the (page, slot) pair written by
/// the active transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub page_id: u64,
    pub slot_id: u64,
}

impl RecordKey {
    pub fn new(page_id: PageID, slot_id: u64) -> Self {
        Self {
            page_id: page_id.0,
            slot_id,
        }
    }
}

impl From<RecordID> for RecordKey {
    fn from(id: RecordID) -> Self {
        Self::new(id.page(), id.slot())
    }
}
