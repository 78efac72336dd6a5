//! Checkpoint store port and, for tests, an in-memory implementation.

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod state_store;

pub use state_store::StateStore;
