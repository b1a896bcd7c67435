/*!
# Hybrid inference - discrete/continuous factor graph elimination

Rust implementation of variable elimination over hybrid factor graphs, where
Gaussian factors over continuous variables are mixed with potentials over
discrete modes and with mixture factors whose Gaussian form a discrete
assignment selects.

## Features

- Decision trees over discrete assignments with structural sharing
- Sequential elimination into a Bayes net, multifrontal elimination into a
  Bayes tree
- Incremental controller that re-eliminates only the newly introduced
  variables and their separator
- Discrete marginals, per-assignment continuous estimates and hybrid MAP

## Modules

- [`hybrid`] - Hybrid factors, conditionals, graphs, elimination results
- [`discrete`] - Keys, assignments, decision trees, discrete factors
- [`gaussian`] - Noise models, Gaussian factors and conditionals, QR elimination
- [`reporter`] - Observability hooks for elimination
- [`common`] - Low-level utilities

## Example

```rust
use hybrid_inference::discrete::shorthand::m;
use hybrid_inference::fixtures::SwitchingChain;
use hybrid_inference::{EliminationConfig, IncrementalHybrid};

let chain = SwitchingChain::new(3).unwrap();
let mut controller = IncrementalHybrid::new(EliminationConfig::default());
for step in 1..=chain.num_steps() {
    let (factors, ordering) = chain.incremental_step(step).unwrap();
    controller.update(&factors, &ordering).unwrap();
}

let marginal = controller.marginal_factor(m(2)).unwrap();
assert!((marginal.total() - 1.0).abs() < 1e-9);
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Hybrid factors, elimination, Bayes nets and trees, incremental updates
pub mod hybrid;

/// Discrete keys, decision trees and discrete inference
pub mod discrete;

/// Linear-Gaussian factors, conditionals and elimination
pub mod gaussian;

/// Low-level utilities (linear algebra, constants)
pub mod common;

/// Elimination configuration
pub mod config;

/// Error types
pub mod errors;

/// Observability hooks
pub mod reporter;

/// Switching-chain scenario used by tests and benchmarks
pub mod fixtures;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Configuration and errors
pub use config::{DiscreteWeighting, EliminationConfig, EliminationConfigBuilder};
pub use errors::{ErrorKind, HybridError};

// Keys and discrete types
pub use discrete::{
    Assignment, DecisionTree, DiscreteConditional, DiscreteFactor, DiscreteKey, Key,
};

// Gaussian types
pub use gaussian::{GaussianConditional, GaussianFactor, NoiseModel, VectorValues};

// Hybrid types
pub use hybrid::{
    Clique, GaussianMixture, HybridBayesNet, HybridBayesTree, HybridConditional, HybridFactor,
    HybridFactorGraph, HybridValues, IncrementalHybrid, IncrementalState, MixtureFactor, Ordering,
};

// Reporters
pub use reporter::{
    CompositeReporter, DebugReporter, EliminationReporter, LoggingReporter, NoOpReporter,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
