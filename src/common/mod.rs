//! Common utilities shared by the discrete, Gaussian and hybrid layers.
//!
//! This module contains numerical constants and dense linear algebra helpers.

pub mod constants;
pub mod linalg;
