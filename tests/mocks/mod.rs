//! Mock implementations for testing without a live cluster.
//!
//! This module provides a configurable cluster reader that can simulate
//! healthy and degraded clusters, reader errors and slow queries.

pub mod cluster;

pub use cluster::*;
