//! Hybrid factor graph
//!
//! [`HybridFactorGraph`] holds shared references to immutable factors, so a
//! residual graph can be reused by the next incremental step without copying.
//! It is also the entry point for sequential and multifrontal elimination.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::EliminationConfig;
use crate::discrete::key::canonical_discrete_keys;
use crate::discrete::{Assignment, DiscreteFactor, DiscreteKey, DiscreteKeys, Key};
use crate::errors::HybridError;
use crate::gaussian::GaussianFactor;
use crate::hybrid::bayes_net::HybridBayesNet;
use crate::hybrid::bayes_tree::{eliminate_multifrontal_impl, HybridBayesTree};
use crate::hybrid::conditional::HybridValues;
use crate::hybrid::elimination::eliminate_sequential_impl;
use crate::hybrid::factor::HybridFactor;
use crate::hybrid::ordering::Ordering;
use crate::reporter::{EliminationReporter, NoOpReporter};

/// Graph of Gaussian, discrete and mixture factors
#[derive(Debug, Clone, Default)]
pub struct HybridFactorGraph {
    factors: Vec<Arc<HybridFactor>>,
}

impl HybridFactorGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph over already shared factors
    pub fn from_shared(factors: Vec<Arc<HybridFactor>>) -> Self {
        Self { factors }
    }

    /// Add a factor
    pub fn push(&mut self, factor: impl Into<HybridFactor>) {
        self.factors.push(Arc::new(factor.into()));
    }

    /// Add a factor shared with another graph
    pub fn push_shared(&mut self, factor: Arc<HybridFactor>) {
        self.factors.push(factor);
    }

    /// Append every factor of `other`, sharing them
    pub fn extend(&mut self, other: &HybridFactorGraph) {
        self.factors.extend(other.factors.iter().cloned());
    }

    /// Number of factors
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// True when the graph holds no factors
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Factor at `index`
    pub fn get(&self, index: usize) -> Option<&HybridFactor> {
        self.factors.get(index).map(|f| f.as_ref())
    }

    /// Shared factors in insertion order
    pub fn factors(&self) -> &[Arc<HybridFactor>] {
        &self.factors
    }

    /// Iterate factors in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &HybridFactor> + '_ {
        self.factors.iter().map(|f| f.as_ref())
    }

    /// Every key mentioned by a factor
    pub fn keys(&self) -> BTreeSet<Key> {
        self.iter().flat_map(|f| f.keys()).collect()
    }

    /// Keys used as continuous variables
    pub fn continuous_key_set(&self) -> BTreeSet<Key> {
        self.iter()
            .flat_map(|f| f.continuous_keys().iter().copied())
            .collect()
    }

    /// Keys used as discrete variables
    pub fn discrete_key_set(&self) -> BTreeSet<Key> {
        self.iter()
            .flat_map(|f| f.discrete_keys().iter().map(|dk| dk.key))
            .collect()
    }

    /// Dimension of every continuous key
    ///
    /// # Errors
    /// [`HybridError::DimensionMismatch`] if two factors disagree
    pub fn continuous_dims(&self) -> Result<BTreeMap<Key, usize>, HybridError> {
        let mut dims = BTreeMap::new();
        for factor in self.iter() {
            for (key, dim) in factor.continuous_keys().iter().zip(factor.continuous_dims()) {
                match dims.insert(*key, *dim) {
                    Some(previous) if previous != *dim => {
                        return Err(HybridError::DimensionMismatch {
                            key: *key,
                            expected: previous,
                            actual: *dim,
                        })
                    }
                    _ => {}
                }
            }
        }
        Ok(dims)
    }

    /// Every discrete key with its cardinality, ascending
    ///
    /// # Errors
    /// [`HybridError::CardinalityMismatch`] if two factors disagree
    pub fn discrete_keys(&self) -> Result<DiscreteKeys, HybridError> {
        let all: Vec<DiscreteKey> = self
            .iter()
            .flat_map(|f| f.discrete_keys().iter().copied())
            .collect();
        canonical_discrete_keys(&all)
    }

    /// Check dimensions, cardinalities, and that no key is used both ways
    pub fn validate(&self) -> Result<(), HybridError> {
        self.continuous_dims()?;
        self.discrete_keys()?;
        let discrete = self.discrete_key_set();
        if let Some(key) = self.continuous_key_set().intersection(&discrete).next() {
            return Err(HybridError::structure(format!(
                "{} is used as both a continuous and a discrete variable",
                key
            )));
        }
        Ok(())
    }

    /// Copies of the purely discrete factors
    pub fn discrete_factors(&self) -> Vec<DiscreteFactor> {
        self.iter()
            .filter_map(|f| match f {
                HybridFactor::Discrete(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sum of factor errors at `values`
    pub fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        let mut total = 0.0;
        for factor in self.iter() {
            total += factor.error(values)?;
        }
        Ok(total)
    }

    /// Un-normalized probability `exp(-error)`
    pub fn prob_prime(&self, values: &HybridValues) -> Result<f64, HybridError> {
        Ok((-self.error(values)?).exp())
    }

    /// Gaussian graph selected by `assignment`
    ///
    /// Discrete factors are skipped; every mixture contributes its selected
    /// component.
    ///
    /// # Errors
    /// - [`HybridError::MissingKey`] if a mixture's key is unassigned
    /// - [`HybridError::DegenerateAssignment`] if a selected component is empty
    pub fn select(&self, assignment: &Assignment) -> Result<Vec<GaussianFactor>, HybridError> {
        let mut out = Vec::new();
        for factor in self.iter() {
            match factor {
                HybridFactor::Gaussian(g) => out.push(g.clone()),
                HybridFactor::Discrete(_) => {}
                HybridFactor::Mixture(m) => match m.component(assignment)? {
                    Some(g) => out.push(g.clone()),
                    None => {
                        return Err(HybridError::DegenerateAssignment {
                            assignment: assignment.restrict(m.discrete_keys()).to_string(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }

    /// Error unless `ordering` covers every key of the graph
    fn require_full(&self, ordering: &Ordering) -> Result<(), HybridError> {
        match self.keys().into_iter().find(|k| !ordering.contains(*k)) {
            Some(key) => Err(HybridError::structure(format!(
                "ordering omits {}; use a partial elimination to keep it",
                key
            ))),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Sequential elimination
    // ------------------------------------------------------------------------

    /// Eliminate every variable into a Bayes net
    ///
    /// # Errors
    /// Structural error if `ordering` does not cover the graph, plus any
    /// error of [`HybridFactorGraph::eliminate_partial_sequential`]
    pub fn eliminate_sequential(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
    ) -> Result<HybridBayesNet, HybridError> {
        self.eliminate_sequential_with(ordering, config, &mut NoOpReporter)
    }

    /// [`HybridFactorGraph::eliminate_sequential`] with a reporter
    pub fn eliminate_sequential_with<R>(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<HybridBayesNet, HybridError>
    where
        R: EliminationReporter + ?Sized,
    {
        self.require_full(ordering)?;
        let (net, _) = eliminate_sequential_impl(self, ordering, config, reporter)?;
        Ok(net)
    }

    /// Eliminate the keys of `ordering`, keeping the rest as a factor graph
    ///
    /// # Returns
    /// The Bayes net over the eliminated keys and the remaining graph
    ///
    /// # Errors
    /// - [`HybridError::Underdetermined`] if a key has no incident factor
    /// - [`HybridError::CardinalityMismatch`] / dimension errors on
    ///   inconsistent graphs
    /// - Structural error when a discrete key is eliminated while a mixture
    ///   still references it
    /// - [`HybridError::SingularSystem`] if every assignment is singular
    pub fn eliminate_partial_sequential(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
    ) -> Result<(HybridBayesNet, HybridFactorGraph), HybridError> {
        eliminate_sequential_impl(self, ordering, config, &mut NoOpReporter)
    }

    /// [`HybridFactorGraph::eliminate_partial_sequential`] with a reporter
    pub fn eliminate_partial_sequential_with<R>(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<(HybridBayesNet, HybridFactorGraph), HybridError>
    where
        R: EliminationReporter + ?Sized,
    {
        eliminate_sequential_impl(self, ordering, config, reporter)
    }

    // ------------------------------------------------------------------------
    // Multifrontal elimination
    // ------------------------------------------------------------------------

    /// Eliminate every variable into a Bayes tree
    pub fn eliminate_multifrontal(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
    ) -> Result<HybridBayesTree, HybridError> {
        self.eliminate_multifrontal_with(ordering, config, &mut NoOpReporter)
    }

    /// [`HybridFactorGraph::eliminate_multifrontal`] with a reporter
    pub fn eliminate_multifrontal_with<R>(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<HybridBayesTree, HybridError>
    where
        R: EliminationReporter + ?Sized,
    {
        self.require_full(ordering)?;
        let (tree, _) = eliminate_multifrontal_impl(self, ordering, config, reporter)?;
        Ok(tree)
    }

    /// Multifrontal elimination of the keys of `ordering`
    pub fn eliminate_partial_multifrontal(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
    ) -> Result<(HybridBayesTree, HybridFactorGraph), HybridError> {
        eliminate_multifrontal_impl(self, ordering, config, &mut NoOpReporter)
    }

    /// [`HybridFactorGraph::eliminate_partial_multifrontal`] with a reporter
    pub fn eliminate_partial_multifrontal_with<R>(
        &self,
        ordering: &Ordering,
        config: &EliminationConfig,
        reporter: &mut R,
    ) -> Result<(HybridBayesTree, HybridFactorGraph), HybridError>
    where
        R: EliminationReporter + ?Sized,
    {
        eliminate_multifrontal_impl(self, ordering, config, reporter)
    }
}

impl FromIterator<HybridFactor> for HybridFactorGraph {
    fn from_iter<T: IntoIterator<Item = HybridFactor>>(iter: T) -> Self {
        Self {
            factors: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

impl FromIterator<Arc<HybridFactor>> for HybridFactorGraph {
    fn from_iter<T: IntoIterator<Item = Arc<HybridFactor>>>(iter: T) -> Self {
        Self {
            factors: iter.into_iter().collect(),
        }
    }
}
