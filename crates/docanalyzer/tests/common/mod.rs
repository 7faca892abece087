//! Shared test utilities for docanalyzer integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Extractor and mirror doubles for observing the worker pool

pub mod doubles;
pub mod harness;

pub use doubles::*;
pub use harness::*;
