//! Observability for hybrid elimination.
//!
//! This module provides the [`EliminationReporter`] trait for debugging and
//! research instrumentation. Reporters receive callbacks at key points during
//! elimination without polluting the core algorithm logic.
//!
//! # Zero-Cost Abstraction
//!
//! The default [`NoOpReporter`] compiles to zero overhead - all callback
//! methods are empty and will be optimized away by the compiler.
//!
//! # Example
//!
//! ```
//! use hybrid_inference::fixtures::SwitchingChain;
//! use hybrid_inference::{DebugReporter, EliminationConfig, Ordering};
//!
//! let chain = SwitchingChain::new(3).unwrap();
//! let mut reporter = DebugReporter::new();
//! let ordering = Ordering::new(chain.x_keys()).unwrap();
//! chain
//!     .linearized()
//!     .eliminate_partial_sequential_with(&ordering, &EliminationConfig::default(), &mut reporter)
//!     .unwrap();
//!
//! assert_eq!(reporter.conditional_events().len(), 3);
//! ```

use crate::discrete::{Assignment, Key};
use crate::hybrid::{HybridBayesNet, HybridConditional, HybridFactor, HybridFactorGraph};

// ============================================================================
// EliminationReporter Trait
// ============================================================================

/// Observability trait for elimination.
///
/// All methods have default empty implementations, so you only need to
/// override the events you care about.
///
/// # Thread Safety
///
/// Reporters use `&mut self` for callbacks and are NOT required to be
/// `Send + Sync`. Parallel code paths buffer their results and replay the
/// callbacks on the calling thread in elimination order.
///
/// # Example
///
/// ```
/// use hybrid_inference::{EliminationReporter, HybridConditional};
///
/// struct CountingReporter {
///     conditionals: usize,
/// }
///
/// impl EliminationReporter for CountingReporter {
///     fn on_conditional(&mut self, _conditional: &HybridConditional) {
///         self.conditionals += 1;
///     }
/// }
/// ```
pub trait EliminationReporter {
    /// Called after a frontal set has been eliminated.
    fn on_conditional(&mut self, _conditional: &HybridConditional) {}

    /// Called for every factor pushed back into the graph by an elimination
    /// step (separator factors and discrete weights).
    fn on_separator(&mut self, _factor: &HybridFactor) {}

    /// Called when one discrete assignment produced a singular system.
    ///
    /// The assignment becomes a zero-probability leaf; elimination continues.
    fn on_degenerate_assignment(&mut self, _frontals: &[Key], _assignment: &Assignment) {}

    /// Called after a Bayes tree clique has been eliminated.
    fn on_clique(&mut self, _index: usize, _conditional: &HybridConditional) {}

    /// Called when the incremental controller withdraws a conditional for
    /// re-elimination.
    fn on_withdrawn(&mut self, _conditional: &HybridConditional) {}

    /// Called after an incremental update has produced its new state.
    fn on_update_complete(&mut self, _bayes_net: &HybridBayesNet, _remaining: &HybridFactorGraph) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
///
/// This is the reporter used by the entry points that take no reporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    /// Create a new no-op reporter.
    pub fn new() -> Self {
        Self
    }
}

impl EliminationReporter for NoOpReporter {
    // All methods use default empty implementations
}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures all events for debugging.
///
/// This reporter clones and stores all data passed to callbacks, allowing
/// post-hoc analysis of an elimination run.
///
/// # Memory Usage
///
/// Mixture conditionals hold one Gaussian conditional per discrete
/// assignment. Capturing a long run keeps all of them alive.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    /// Captured conditionals in elimination order
    conditionals: Vec<HybridConditional>,

    /// Captured separator factors
    separators: Vec<HybridFactor>,

    /// Captured degenerate assignments (frontals, assignment)
    degenerate: Vec<(Vec<Key>, Assignment)>,

    /// Captured clique events (clique index, conditional)
    cliques: Vec<(usize, HybridConditional)>,

    /// Captured withdrawn conditionals
    withdrawn: Vec<HybridConditional>,

    /// Captured update completions (Bayes net size, remaining factor count)
    update_completes: Vec<(usize, usize)>,
}

impl DebugReporter {
    /// Create a new debug reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.conditionals.clear();
        self.separators.clear();
        self.degenerate.clear();
        self.cliques.clear();
        self.withdrawn.clear();
        self.update_completes.clear();
    }

    /// Get captured conditionals.
    pub fn conditional_events(&self) -> &[HybridConditional] {
        &self.conditionals
    }

    /// Get captured separator factors.
    pub fn separator_events(&self) -> &[HybridFactor] {
        &self.separators
    }

    /// Get captured degenerate assignments.
    pub fn degenerate_events(&self) -> &[(Vec<Key>, Assignment)] {
        &self.degenerate
    }

    /// Get captured clique events.
    pub fn clique_events(&self) -> &[(usize, HybridConditional)] {
        &self.cliques
    }

    /// Get captured withdrawn conditionals.
    pub fn withdrawn_events(&self) -> &[HybridConditional] {
        &self.withdrawn
    }

    /// Get captured update completions as (net size, remaining factors).
    pub fn update_complete_events(&self) -> &[(usize, usize)] {
        &self.update_completes
    }

    /// Total number of captured events across all types.
    pub fn total_events(&self) -> usize {
        self.conditionals.len()
            + self.separators.len()
            + self.degenerate.len()
            + self.cliques.len()
            + self.withdrawn.len()
            + self.update_completes.len()
    }
}

impl EliminationReporter for DebugReporter {
    fn on_conditional(&mut self, conditional: &HybridConditional) {
        self.conditionals.push(conditional.clone());
    }

    fn on_separator(&mut self, factor: &HybridFactor) {
        self.separators.push(factor.clone());
    }

    fn on_degenerate_assignment(&mut self, frontals: &[Key], assignment: &Assignment) {
        self.degenerate.push((frontals.to_vec(), assignment.clone()));
    }

    fn on_clique(&mut self, index: usize, conditional: &HybridConditional) {
        self.cliques.push((index, conditional.clone()));
    }

    fn on_withdrawn(&mut self, conditional: &HybridConditional) {
        self.withdrawn.push(conditional.clone());
    }

    fn on_update_complete(&mut self, bayes_net: &HybridBayesNet, remaining: &HybridFactorGraph) {
        self.update_completes.push((bayes_net.len(), remaining.len()));
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that logs events using the log crate.
///
/// # Log Levels
///
/// - `on_update_complete`: INFO
/// - `on_conditional`, `on_clique`, `on_withdrawn`: DEBUG
/// - `on_degenerate_assignment`: WARN
/// - `on_separator`: TRACE
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    /// Whether to include per-leaf details in log messages
    verbose: bool,
}

impl LoggingReporter {
    /// Create a new logging reporter.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging reporter that includes per-leaf details.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl EliminationReporter for LoggingReporter {
    fn on_conditional(&mut self, conditional: &HybridConditional) {
        log::debug!("Eliminated {}", conditional);
        if self.verbose {
            if let HybridConditional::Mixture(mixture) = conditional {
                for (assignment, leaf) in mixture.conditionals().iter() {
                    match leaf {
                        Some(c) => log::trace!("  {} -> log normalizer {:.6}", assignment, c.log_normalizer()),
                        None => log::trace!("  {} -> degenerate", assignment),
                    }
                }
            }
        }
    }

    fn on_separator(&mut self, factor: &HybridFactor) {
        log::trace!("Separator {}", factor);
    }

    fn on_degenerate_assignment(&mut self, frontals: &[Key], assignment: &Assignment) {
        let names: Vec<String> = frontals.iter().map(|k| k.to_string()).collect();
        log::warn!(
            "Singular system eliminating [{}] under {}",
            names.join(", "),
            assignment
        );
    }

    fn on_clique(&mut self, index: usize, conditional: &HybridConditional) {
        log::debug!("Clique {} eliminated: {}", index, conditional);
    }

    fn on_withdrawn(&mut self, conditional: &HybridConditional) {
        log::debug!("Withdrawn for re-elimination: {}", conditional);
    }

    fn on_update_complete(&mut self, bayes_net: &HybridBayesNet, remaining: &HybridFactorGraph) {
        log::info!(
            "Update complete: {} conditionals, {} remaining factors",
            bayes_net.len(),
            remaining.len()
        );
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards events to two child reporters.
///
/// # Example
///
/// ```
/// use hybrid_inference::{CompositeReporter, DebugReporter, LoggingReporter};
///
/// let composite = CompositeReporter::new(DebugReporter::new(), LoggingReporter::new());
/// assert_eq!(composite.first().total_events(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: EliminationReporter, B: EliminationReporter> {
    first: A,
    second: B,
}

impl<A: EliminationReporter, B: EliminationReporter> CompositeReporter<A, B> {
    /// Create a new composite reporter.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Get a reference to the first reporter.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// Get a mutable reference to the first reporter.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// Get a reference to the second reporter.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Get a mutable reference to the second reporter.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }

    /// Consume and return both reporters.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: EliminationReporter, B: EliminationReporter> EliminationReporter for CompositeReporter<A, B> {
    fn on_conditional(&mut self, conditional: &HybridConditional) {
        self.first.on_conditional(conditional);
        self.second.on_conditional(conditional);
    }

    fn on_separator(&mut self, factor: &HybridFactor) {
        self.first.on_separator(factor);
        self.second.on_separator(factor);
    }

    fn on_degenerate_assignment(&mut self, frontals: &[Key], assignment: &Assignment) {
        self.first.on_degenerate_assignment(frontals, assignment);
        self.second.on_degenerate_assignment(frontals, assignment);
    }

    fn on_clique(&mut self, index: usize, conditional: &HybridConditional) {
        self.first.on_clique(index, conditional);
        self.second.on_clique(index, conditional);
    }

    fn on_withdrawn(&mut self, conditional: &HybridConditional) {
        self.first.on_withdrawn(conditional);
        self.second.on_withdrawn(conditional);
    }

    fn on_update_complete(&mut self, bayes_net: &HybridBayesNet, remaining: &HybridFactorGraph) {
        self.first.on_update_complete(bayes_net, remaining);
        self.second.on_update_complete(bayes_net, remaining);
    }
}

// ============================================================================
// Tests
// ============================================================================
