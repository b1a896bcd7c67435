//! Hybrid discrete/continuous inference
//!
//! - [`factor`]: Gaussian, discrete and mixture factors
//! - [`conditional`]: Gaussian mixtures and hybrid conditionals
//! - [`factor_graph`]: the graph container and elimination entry points
//! - [`ordering`]: elimination orderings and heuristics
//! - [`elimination`]: per-frontal hybrid elimination
//! - [`bayes_net`] / [`bayes_tree`]: elimination results and their queries
//! - [`incremental`]: incremental controller

pub mod bayes_net;
pub mod bayes_tree;
pub mod conditional;
pub mod elimination;
pub mod factor;
pub mod factor_graph;
pub mod incremental;
pub mod ordering;

pub use bayes_net::HybridBayesNet;
pub use bayes_tree::{Clique, HybridBayesTree};
pub use conditional::{GaussianMixture, HybridConditional, HybridValues, MixtureLeaf};
pub use elimination::{eliminate_frontals, HybridElimination};
pub use factor::{HybridFactor, MixtureComponent, MixtureFactor};
pub use factor_graph::HybridFactorGraph;
pub use incremental::{IncrementalHybrid, IncrementalState};
pub use ordering::Ordering;
