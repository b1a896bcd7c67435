//! Hybrid Bayes net
//!
//! Conditionals are stored in elimination order and shared through `Arc`, so
//! an incremental update can keep the conditionals of earlier steps without
//! copying them.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::discrete::{discrete_marginal, discrete_mpe, Assignment, DiscreteFactor, Key};
use crate::errors::HybridError;
use crate::gaussian::VectorValues;
use crate::hybrid::conditional::{HybridConditional, HybridValues};
use crate::hybrid::factor_graph::HybridFactorGraph;

/// Product of hybrid conditionals in elimination order
#[derive(Debug, Clone, Default)]
pub struct HybridBayesNet {
    conditionals: Vec<Arc<HybridConditional>>,
}

impl HybridBayesNet {
    /// Empty net
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a conditional
    pub fn push(&mut self, conditional: HybridConditional) {
        self.conditionals.push(Arc::new(conditional));
    }

    /// Append a shared conditional
    pub fn push_shared(&mut self, conditional: Arc<HybridConditional>) {
        self.conditionals.push(conditional);
    }

    /// Number of conditionals
    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    /// True when the net holds no conditional
    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    /// Conditional at `index` in elimination order
    pub fn at(&self, index: usize) -> Option<&HybridConditional> {
        self.conditionals.get(index).map(|c| c.as_ref())
    }

    /// Iterate in elimination order
    pub fn iter(&self) -> impl Iterator<Item = &HybridConditional> + '_ {
        self.conditionals.iter().map(|c| c.as_ref())
    }

    /// Shared conditionals in elimination order
    pub fn shared(&self) -> &[Arc<HybridConditional>] {
        &self.conditionals
    }

    /// Union of all frontal keys
    pub fn frontal_keys(&self) -> BTreeSet<Key> {
        self.iter().flat_map(|c| c.frontals()).collect()
    }

    /// Index of the conditional whose frontals include `key`
    pub fn index_of(&self, key: Key) -> Option<usize> {
        self.conditionals.iter().position(|c| c.is_frontal(key))
    }

    /// Whether `key` has been eliminated into this net
    pub fn contains(&self, key: Key) -> bool {
        self.index_of(key).is_some()
    }

    /// Conditional on `key`
    ///
    /// # Errors
    /// [`HybridError::NotEliminated`] if no conditional has `key` as frontal
    pub fn conditional_of(&self, key: Key) -> Result<&HybridConditional, HybridError> {
        self.index_of(key)
            .and_then(|i| self.at(i))
            .ok_or(HybridError::NotEliminated { key })
    }

    /// Check the topological invariants
    ///
    /// Frontal sets are pairwise disjoint and no conditional has a parent
    /// that an earlier conditional already eliminated.
    pub fn validate(&self) -> Result<(), HybridError> {
        let mut eliminated = BTreeSet::new();
        for conditional in self.iter() {
            if let Some(parent) = conditional.parents().into_iter().find(|p| eliminated.contains(p)) {
                return Err(HybridError::structure(format!(
                    "{} depends on {}, which an earlier conditional eliminated",
                    conditional, parent
                )));
            }
            for key in conditional.frontals() {
                if !eliminated.insert(key) {
                    return Err(HybridError::DuplicateKey { key });
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Most likely continuous values under a fixed discrete assignment
    ///
    /// Back-substitutes in reverse elimination order. Discrete conditionals
    /// are skipped.
    ///
    /// # Errors
    /// - [`HybridError::MissingKey`] if a discrete parent is unassigned or a
    ///   continuous parent was never eliminated
    /// - [`HybridError::DegenerateAssignment`] at a singular mixture leaf
    #[cfg_attr(all(feature = "hotpath", not(test)), hotpath::measure)]
    pub fn optimize(&self, assignment: &Assignment) -> Result<VectorValues, HybridError> {
        let mut values = HybridValues::new(VectorValues::new(), assignment.clone());
        for conditional in self.conditionals.iter().rev() {
            if conditional.is_discrete() {
                continue;
            }
            let solved = conditional.solve(&values)?;
            values.continuous.extend(solved);
        }
        Ok(values.continuous)
    }

    /// Hybrid MAP estimate
    ///
    /// The discrete part is the most probable assignment under the discrete
    /// conditionals of this net and the discrete factors of `remaining`;
    /// discrete parents no factor mentions default to value 0. The
    /// continuous part is [`HybridBayesNet::optimize`] at that assignment.
    pub fn optimize_with(&self, remaining: &HybridFactorGraph) -> Result<HybridValues, HybridError> {
        let mut factors = remaining.discrete_factors();
        factors.extend(self.discrete_factors());
        let mut assignment = if factors.is_empty() {
            Assignment::new()
        } else {
            discrete_mpe(&factors)?
        };
        for conditional in self.iter() {
            for dk in conditional.discrete_parents() {
                if !assignment.contains(dk.key) {
                    log::warn!("{} has no discrete evidence; assuming value 0", dk.key);
                    assignment.insert(dk.key, 0);
                }
            }
        }
        let continuous = self.optimize(&assignment)?;
        Ok(HybridValues::new(continuous, assignment))
    }

    /// Discrete conditionals as factors
    pub fn discrete_factors(&self) -> Vec<DiscreteFactor> {
        self.iter()
            .filter_map(|c| c.as_discrete().map(|d| d.to_factor()))
            .collect()
    }

    /// Normalized marginal of the discrete variable `key`
    ///
    /// # Errors
    /// [`HybridError::NotEliminated`] unless a discrete conditional of this
    /// net has `key` as frontal
    pub fn marginal_factor(&self, key: Key) -> Result<DiscreteFactor, HybridError> {
        if !self.iter().any(|c| c.is_discrete() && c.is_frontal(key)) {
            return Err(HybridError::NotEliminated { key });
        }
        discrete_marginal(&self.discrete_factors(), key)
    }

    /// Product of all conditionals at `values`
    pub fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        let mut product = 1.0;
        for conditional in self.iter() {
            product *= conditional.evaluate(values)?;
        }
        Ok(product)
    }

    /// Split off the conditionals whose frontals are in `keys`
    ///
    /// # Returns
    /// The net without those conditionals and the withdrawn conditionals in
    /// their original order
    ///
    /// # Errors
    /// Structural error if a conditional has only some of its frontals in
    /// `keys`, or a withdrawn conditional depends on a frontal that stays
    pub fn withdraw(&self, keys: &[Key]) -> Result<(HybridBayesNet, Vec<Arc<HybridConditional>>), HybridError> {
        let mut kept = HybridBayesNet::new();
        let mut withdrawn = Vec::new();
        for conditional in &self.conditionals {
            let frontals = conditional.frontals();
            let hits = frontals.iter().filter(|k| keys.contains(k)).count();
            if hits == 0 {
                kept.push_shared(Arc::clone(conditional));
            } else if hits == frontals.len() {
                withdrawn.push(Arc::clone(conditional));
            } else {
                return Err(HybridError::structure(format!(
                    "cannot re-eliminate part of the frontals of {}",
                    conditional
                )));
            }
        }
        let kept_frontals = kept.frontal_keys();
        for conditional in &withdrawn {
            if let Some(parent) = conditional.parents().into_iter().find(|p| kept_frontals.contains(p)) {
                return Err(HybridError::structure(format!(
                    "cannot re-eliminate {}: its parent {} stays eliminated",
                    conditional, parent
                )));
            }
        }
        Ok((kept, withdrawn))
    }

    /// Compare conditional by conditional with an absolute tolerance
    pub fn equals(&self, other: &HybridBayesNet, tol: f64) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a.equals(b, tol))
    }
}

impl FromIterator<HybridConditional> for HybridBayesNet {
    fn from_iter<T: IntoIterator<Item = HybridConditional>>(iter: T) -> Self {
        Self {
            conditionals: iter.into_iter().map(Arc::new).collect(),
        }
    }
}
