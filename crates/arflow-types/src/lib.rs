//! Shared domain types for arflow.
//!
//! This crate contains the types every layer of the receivables pipeline
//! agrees on: the per-instance `InvoiceState`, its checkpoint record, the
//! advisor request/response payloads, engine configuration and events.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod advisor;
pub mod config;
pub mod error;
pub mod event;
pub mod state;
