//! The receivables pipeline: graph, node set, failure policy, runner and
//! batch coordinator.

pub mod batch;
pub mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod policy;
pub mod runner;

#[cfg(test)]
mod scenarios;

pub use batch::{BatchCoordinator, BatchItem, BatchItemResult, BatchResult};
pub use error::EngineError;
pub use graph::{Branch, Graph, GraphBuilder, GraphError, NodeSpec, Target};
pub use policy::RetryPolicy;
pub use runner::{Engine, prepare_resume};
