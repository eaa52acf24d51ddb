use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Record {0} is out of bounds")]
    RecordOutOfBounds(u64),

    #[error("Operation requires an active transaction")]
    TransactionRequired,

    #[error("Malformed log record: {0}")]
    LogParse(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
