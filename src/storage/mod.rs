//! Outbox storage backends.

pub mod memory;
pub mod sql;
pub mod traits;

pub use memory::InMemoryOutbox;
pub use sql::SqliteOutbox;
pub use traits::{OutboxStore, OutboxUpdate, StorageError};
