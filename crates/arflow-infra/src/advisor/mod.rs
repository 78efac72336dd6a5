//! Advisor adapters.
//!
//! The only production adapter is an HTTP client that talks to a gateway
//! exposing one JSON endpoint per advisor.

pub mod http;

pub use http::HttpAdvisorClient;
