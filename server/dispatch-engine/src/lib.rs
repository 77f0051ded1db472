//! Incident Dispatch Engine: deterministic, score-based responder routing.
//!
//! Maps each reported incident to a responder specialization, hard-filters
//! candidates by status, capacity, and distance, ranks the rest by a weighted
//! distance/load/recency score, and commits the winning assignment, or queues
//! the incident when nobody qualifies.
//!
//! Storage and notification delivery are injected through the traits in
//! [`ports`]; [`memory`] provides in-process adapters.

pub mod config;
pub mod decision;
pub mod dispatcher;
pub mod error;
pub mod geo;
pub mod memory;
pub mod normalize;
pub mod ports;
pub mod scoring;
pub mod state;
pub mod types;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use types::{DispatchResult, Incident, InboundIncident, InboundResponder, Responder};
