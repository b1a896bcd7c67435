//! Incremental hybrid elimination
//!
//! The controller keeps a running [`HybridBayesNet`] and the residual graph of
//! factors not yet eliminated. Each update:
//!
//! 1. Withdraws the conditionals whose frontals the new ordering names again
//!    and converts them back into factors
//! 2. Merges the residual graph, the withdrawn factors and the new factors
//! 3. Eliminates the new ordering over that working graph
//! 4. Appends the new conditionals and replaces the residual graph
//!
//! Conditionals of earlier updates that are not withdrawn are kept as shared
//! references and never recomputed.
//!
//! [`IncrementalState::update`] is a pure function from one state to the
//! next; [`IncrementalHybrid`] wraps it with a configuration and only
//! replaces its state once an update has fully succeeded.

use std::sync::Arc;

use crate::config::EliminationConfig;
use crate::discrete::{discrete_marginal, Assignment, DiscreteFactor, Key};
use crate::errors::HybridError;
use crate::gaussian::VectorValues;
use crate::hybrid::bayes_net::HybridBayesNet;
use crate::hybrid::conditional::HybridValues;
use crate::hybrid::elimination::eliminate_sequential_impl;
use crate::hybrid::factor::HybridFactor;
use crate::hybrid::factor_graph::HybridFactorGraph;
use crate::hybrid::ordering::Ordering;
use crate::reporter::{EliminationReporter, NoOpReporter};

// ============================================================================
// IncrementalState
// ============================================================================

/// Bayes net accumulated so far plus the residual graph
#[derive(Debug, Clone, Default)]
pub struct IncrementalState {
    bayes_net: HybridBayesNet,
    remaining: HybridFactorGraph,
}

impl IncrementalState {
    /// State before the first update
    pub fn new() -> Self {
        Self::default()
    }

    /// State from an existing net and residual graph
    pub fn from_parts(bayes_net: HybridBayesNet, remaining: HybridFactorGraph) -> Self {
        Self { bayes_net, remaining }
    }

    /// Accumulated conditionals
    pub fn bayes_net(&self) -> &HybridBayesNet {
        &self.bayes_net
    }

    /// Factors not yet eliminated
    pub fn remaining(&self) -> &HybridFactorGraph {
        &self.remaining
    }

    /// Eliminate `ordering` over the residual graph plus `new_factors`
    ///
    /// # Arguments
    /// * `new_factors` - Factors introduced by this step
    /// * `ordering` - New continuous keys, plus earlier keys to re-eliminate
    /// * `config` - Elimination configuration
    /// * `reporter` - Receives withdrawal, elimination and completion events
    ///
    /// # Returns
    /// The next state; `self` is left untouched
    ///
    /// # Errors
    /// Any elimination error, and a structural error when a withdrawal would
    /// break the net's topological order
    #[cfg_attr(all(feature = "hotpath", not(test)), hotpath::measure)]
    pub fn update<R>(
        &self,
        new_factors: &HybridFactorGraph,
        ordering: &Ordering,
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<IncrementalState, HybridError>
    where
        R: EliminationReporter + ?Sized,
    {
        let (mut bayes_net, withdrawn) = self.bayes_net.withdraw(ordering.keys())?;

        let mut working: Vec<Arc<HybridFactor>> = self.remaining.factors().to_vec();
        for conditional in &withdrawn {
            reporter.on_withdrawn(conditional);
            log::debug!("Re-eliminating {}", conditional);
            working.extend(conditional.to_factors(config.weighting)?.into_iter().map(Arc::new));
        }
        working.extend(new_factors.factors().iter().cloned());
        let working = HybridFactorGraph::from_shared(working);

        let (step_net, remaining) = eliminate_sequential_impl(&working, ordering, config, reporter)?;
        for conditional in step_net.shared() {
            bayes_net.push_shared(Arc::clone(conditional));
        }
        reporter.on_update_complete(&bayes_net, &remaining);
        log::info!(
            "Incremental update: {} new factors, {} withdrawn, net has {} conditionals, {} factors remain",
            new_factors.len(),
            withdrawn.len(),
            bayes_net.len(),
            remaining.len()
        );
        Ok(IncrementalState { bayes_net, remaining })
    }

    /// Discrete factors of the residual graph and the net
    pub fn discrete_factors(&self) -> Vec<DiscreteFactor> {
        let mut factors = self.remaining.discrete_factors();
        factors.extend(self.bayes_net.discrete_factors());
        factors
    }
}

// ============================================================================
// IncrementalHybrid
// ============================================================================

/// Incremental controller over repeated batches of factors
///
/// # Example
///
/// ```
/// use hybrid_inference::fixtures::SwitchingChain;
/// use hybrid_inference::{EliminationConfig, IncrementalHybrid};
///
/// let chain = SwitchingChain::new(3).unwrap();
/// let mut controller = IncrementalHybrid::new(EliminationConfig::default());
/// for step in 1..=chain.num_steps() {
///     let (factors, ordering) = chain.incremental_step(step).unwrap();
///     controller.update(&factors, &ordering).unwrap();
/// }
/// assert_eq!(controller.bayes_net().len(), 3);
/// assert!(controller.remaining_graph().iter().all(|f| f.is_discrete()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IncrementalHybrid {
    config: EliminationConfig,
    state: IncrementalState,
    num_updates: usize,
}

impl IncrementalHybrid {
    /// Controller with an empty state
    pub fn new(config: EliminationConfig) -> Self {
        Self {
            config,
            state: IncrementalState::new(),
            num_updates: 0,
        }
    }

    /// Configuration used by every update
    pub fn config(&self) -> &EliminationConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> &IncrementalState {
        &self.state
    }

    /// Accumulated Bayes net
    pub fn bayes_net(&self) -> &HybridBayesNet {
        self.state.bayes_net()
    }

    /// Residual factor graph
    pub fn remaining_graph(&self) -> &HybridFactorGraph {
        self.state.remaining()
    }

    /// Number of successful updates
    pub fn num_updates(&self) -> usize {
        self.num_updates
    }

    /// Add `new_factors` and eliminate `ordering`
    ///
    /// On error the controller keeps its previous state.
    pub fn update(&mut self, new_factors: &HybridFactorGraph, ordering: &Ordering) -> Result<(), HybridError> {
        self.update_with(new_factors, ordering, &mut NoOpReporter)
    }

    /// [`IncrementalHybrid::update`] with a reporter
    pub fn update_with<R>(
        &mut self,
        new_factors: &HybridFactorGraph,
        ordering: &Ordering,
        reporter: &mut R,
    ) -> Result<(), HybridError>
    where
        R: EliminationReporter + ?Sized,
    {
        let next = self.state.update(new_factors, ordering, &self.config, reporter)?;
        self.state = next;
        self.num_updates += 1;
        Ok(())
    }

    /// Normalized marginal of the discrete variable `key`
    ///
    /// Combines the residual discrete factors with any discrete conditionals
    /// in the net.
    ///
    /// # Errors
    /// [`HybridError::NotEliminated`] if no discrete factor mentions `key`
    pub fn marginal_factor(&self, key: Key) -> Result<DiscreteFactor, HybridError> {
        let factors = self.state.discrete_factors();
        if !factors.iter().any(|f| f.involves(key)) {
            return Err(HybridError::NotEliminated { key });
        }
        discrete_marginal(&factors, key)
    }

    /// Continuous estimate under a fixed discrete assignment
    pub fn optimize_at(&self, assignment: &Assignment) -> Result<VectorValues, HybridError> {
        self.bayes_net().optimize(assignment)
    }

    /// Hybrid MAP estimate: discrete MPE, then back-substitution
    pub fn optimize(&self) -> Result<HybridValues, HybridError> {
        self.bayes_net().optimize_with(self.remaining_graph())
    }
}
