//! Pipeline engine and port definitions for arflow.
//!
//! This crate owns the graph, the node handlers, the failure policy and the
//! runner. It defines the "ports" the infrastructure layer implements
//! (`StateStore` and the advisor traits) and never depends on arflow-infra
//! or any database/IO crate.

pub mod advisor;
pub mod event;
pub mod pipeline;
pub mod repository;
