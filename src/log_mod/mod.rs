mod journal;

pub use journal::{Journal, LogKind, LogRecord};
