//! SQLite persistence.

pub mod checkpoint;
pub mod pool;

pub use checkpoint::SqliteStateStore;
pub use pool::DatabasePool;
