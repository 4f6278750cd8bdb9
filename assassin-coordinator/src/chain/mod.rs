//! Settlement chain integration: the inbound event consumer.
//!
//! The outbound half (the operator outbox) lives inside the coordinator,
//! which owns the submission ordering guarantees.

pub mod adapter;

pub use adapter::ChainAdapter;
