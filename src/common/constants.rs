//! Numerical constants used throughout elimination
//!
//! These are defaults only. Every threshold that affects results can be
//! overridden through [`EliminationConfig`](crate::config::EliminationConfig).

/// Default rank tolerance for triangularization
///
/// A frontal diagonal entry of `R` with magnitude at or below this value marks
/// the per-assignment system as singular.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-9;

/// Whether residual discrete factors whose leaves are all exactly one are
/// dropped instead of pushed into the remaining graph
pub const DEFAULT_DROP_UNIT_FACTORS: bool = true;

/// Minimum total mass for a discrete factor to be normalizable
///
/// Sums below this are treated as zero when normalizing a marginal.
pub const EPSILON_MASS: f64 = 1e-300;

/// `0.5 * ln(2π)`, the per-dimension Gaussian log normalizer
pub const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;
