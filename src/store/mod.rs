//! Persistence: the inbox the matcher searches and the dedup record.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::{MemoryDedupStore, MemoryMessageStore};
pub use traits::{DedupState, DedupStore, MessageStore, StoredMessage};
