//! Shared helpers for the hybrid elimination integration tests
//!
//! Tolerance assertions and randomized scenario builders used across the
//! test modules.

pub mod assertions;
pub mod scenarios;
