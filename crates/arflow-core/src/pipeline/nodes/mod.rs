//! Handlers for the default receivables pipeline.
//!
//! One module per node. Each exposes a `run` function with the copy-on-write
//! contract from `pipeline::node`; the dispatch table there wires them up.

pub mod collection;
pub mod enrich;
pub mod export;
pub mod extract;
pub mod intake;
pub mod payer_check;
pub mod terms;
pub mod triage;
pub mod validate;
pub mod working_capital;
