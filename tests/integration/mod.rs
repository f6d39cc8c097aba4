//! Integration tests for upgrade-preflight.
//!
//! These tests drive the public pipeline against mock cluster readers.

pub mod cli_tests;
pub mod engine_tests;
pub mod scenario_tests;
