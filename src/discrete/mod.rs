//! Discrete variables, decision trees and discrete inference
//!
//! - [`key`]: variable keys, discrete keys, assignments
//! - [`tree`]: persistent [`DecisionTree`]
//! - [`factor`] / [`conditional`]: potentials and conditional tables
//! - [`elimination`]: sum-product / max-product variable elimination

pub mod conditional;
pub mod elimination;
pub mod factor;
pub mod key;
pub mod tree;

pub use conditional::DiscreteConditional;
pub use elimination::{discrete_marginal, discrete_mpe, eliminate_discrete};
pub use factor::DiscreteFactor;
pub use key::{
    shorthand, symbol, Assignment, AssignmentIter, DiscreteKey, DiscreteKeys, Key,
};
pub use tree::DecisionTree;
