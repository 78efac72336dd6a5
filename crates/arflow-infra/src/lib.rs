//! Infrastructure layer for arflow.
//!
//! Contains implementations of the ports defined in `arflow-core`: the
//! SQLite checkpoint store, the HTTP advisor gateway client, and the
//! configuration loader.

pub mod advisor;
pub mod config;
pub mod sqlite;
