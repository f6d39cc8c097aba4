//! Validation engine module.
//!
//! Check registry, sequential execution, run context and verdict
//! aggregation.

pub mod cancel;
pub mod context;
pub mod orchestrator;
pub mod registry;
pub mod result;
