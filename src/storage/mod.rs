mod file;
mod pager;

pub use file::{File, MemoryFile, PosixFile};
pub use pager::Pager;
