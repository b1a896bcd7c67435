//! Configuration types for elimination
//!
//! [`EliminationConfig`] collects every knob that changes numeric results of
//! hybrid elimination. It is passed by reference into the factor graph entry
//! points and the incremental controller.

use serde::{Deserialize, Serialize};

use crate::common::constants::{DEFAULT_DROP_UNIT_FACTORS, DEFAULT_RANK_TOLERANCE};

/// How the per-assignment continuous mass is turned into a discrete factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscreteWeighting {
    /// Leaf is `exp(-E_min(a))`, the residual energy left after eliminating
    /// the continuous variable under assignment `a`
    #[default]
    ResidualEnergy,
    /// Leaf additionally carries the integrated Gaussian normalizer
    /// `(2π)^{n/2} / |det R|`
    MarginalLikelihood,
}

/// Elimination configuration.
///
/// # Example
///
/// ```
/// use hybrid_inference::{DiscreteWeighting, EliminationConfig};
///
/// let config = EliminationConfig::builder()
///     .weighting(DiscreteWeighting::MarginalLikelihood)
///     .rank_tolerance(1e-12)
///     .build();
/// assert!(!config.weighting.is_residual_only());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliminationConfig {
    /// Discrete weighting of eliminated continuous mass
    pub weighting: DiscreteWeighting,
    /// |R_ii| at or below this marks a singular frontal block
    pub rank_tolerance: f64,
    /// Skip residual discrete factors whose leaves are all exactly one
    pub drop_unit_factors: bool,
}

impl DiscreteWeighting {
    /// True for [`DiscreteWeighting::ResidualEnergy`]
    pub fn is_residual_only(self) -> bool {
        matches!(self, DiscreteWeighting::ResidualEnergy)
    }
}

impl EliminationConfig {
    /// Create a configuration.
    pub fn new(weighting: DiscreteWeighting, rank_tolerance: f64, drop_unit_factors: bool) -> Self {
        Self {
            weighting,
            rank_tolerance,
            drop_unit_factors,
        }
    }

    /// Create with builder pattern.
    pub fn builder() -> EliminationConfigBuilder {
        EliminationConfigBuilder::default()
    }
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            weighting: DiscreteWeighting::default(),
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
            drop_unit_factors: DEFAULT_DROP_UNIT_FACTORS,
        }
    }
}

/// Builder for EliminationConfig.
#[derive(Debug, Default)]
pub struct EliminationConfigBuilder {
    weighting: Option<DiscreteWeighting>,
    rank_tolerance: Option<f64>,
    drop_unit_factors: Option<bool>,
}

impl EliminationConfigBuilder {
    /// Set the discrete weighting.
    pub fn weighting(mut self, weighting: DiscreteWeighting) -> Self {
        self.weighting = Some(weighting);
        self
    }

    /// Set the rank tolerance.
    pub fn rank_tolerance(mut self, tolerance: f64) -> Self {
        self.rank_tolerance = Some(tolerance);
        self
    }

    /// Set whether all-one residual factors are dropped.
    pub fn drop_unit_factors(mut self, drop: bool) -> Self {
        self.drop_unit_factors = Some(drop);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EliminationConfig {
        EliminationConfig {
            weighting: self.weighting.unwrap_or_default(),
            rank_tolerance: self.rank_tolerance.unwrap_or(DEFAULT_RANK_TOLERANCE),
            drop_unit_factors: self
                .drop_unit_factors
                .unwrap_or(DEFAULT_DROP_UNIT_FACTORS),
        }
    }
}
