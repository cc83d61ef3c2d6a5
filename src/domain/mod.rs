pub mod fetch_log;
pub mod item;

pub use fetch_log::{FetchKind, FetchLogEntry, NewFetchLog, RunStatus};
pub use item::{Item, ItemMetadata, Review};
