//! Hybrid conditionals
//!
//! Elimination of one frontal set yields a [`HybridConditional`]:
//!
//! - `Gaussian` when no discrete key was involved
//! - `Mixture` ([`GaussianMixture`]) when mixtures selected the Gaussian form;
//!   one square-root conditional per discrete assignment
//! - `Discrete` for discrete frontals

use std::fmt;
use std::sync::Arc;

use crate::config::DiscreteWeighting;
use crate::discrete::{Assignment, DecisionTree, DiscreteConditional, DiscreteFactor, DiscreteKey, Key};
use crate::errors::HybridError;
use crate::gaussian::{DimVec, GaussianConditional, KeyVec, VectorValues};
use crate::hybrid::factor::{HybridFactor, MixtureComponent, MixtureFactor};

/// Continuous values together with a discrete assignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridValues {
    /// Continuous part
    pub continuous: VectorValues,
    /// Discrete part
    pub discrete: Assignment,
}

impl HybridValues {
    /// Bundle continuous values and a discrete assignment
    pub fn new(continuous: VectorValues, discrete: Assignment) -> Self {
        Self {
            continuous,
            discrete,
        }
    }
}

/// Leaf of a [`GaussianMixture`]: `None` for a singular assignment
pub type MixtureLeaf = Option<Arc<GaussianConditional>>;

// ============================================================================
// GaussianMixture
// ============================================================================

/// Gaussian conditional selected by discrete parents
///
/// Every present leaf shares the same frontal and continuous parent layout.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    frontals: KeyVec,
    frontal_dims: DimVec,
    parents: KeyVec,
    parent_dims: DimVec,
    conditionals: DecisionTree<MixtureLeaf>,
}

impl GaussianMixture {
    /// Wrap a tree of conditionals
    ///
    /// # Errors
    /// Structural error if every leaf is degenerate or two leaves disagree on
    /// their key layout
    pub fn new(conditionals: DecisionTree<MixtureLeaf>) -> Result<Self, HybridError> {
        let present: Vec<&GaussianConditional> = conditionals
            .leaves()
            .into_iter()
            .filter_map(|c| c.as_deref())
            .collect();
        let first = present
            .first()
            .ok_or_else(|| HybridError::structure("Gaussian mixture has no admissible leaf"))?;
        for other in &present[1..] {
            if other.frontals() != first.frontals()
                || other.frontal_dims() != first.frontal_dims()
                || other.parents() != first.parents()
                || other.parent_dims() != first.parent_dims()
            {
                return Err(HybridError::structure(format!(
                    "mixture leaves {} and {} have different layouts",
                    first, other
                )));
            }
        }
        Ok(Self {
            frontals: first.frontals().iter().copied().collect(),
            frontal_dims: first.frontal_dims().iter().copied().collect(),
            parents: first.parents().iter().copied().collect(),
            parent_dims: first.parent_dims().iter().copied().collect(),
            conditionals,
        })
    }

    /// Frontal keys in elimination order
    pub fn frontals(&self) -> &[Key] {
        &self.frontals
    }

    /// Frontal dimensions
    pub fn frontal_dims(&self) -> &[usize] {
        &self.frontal_dims
    }

    /// Continuous parents, ascending
    pub fn continuous_parents(&self) -> &[Key] {
        &self.parents
    }

    /// Continuous parent dimensions
    pub fn parent_dims(&self) -> &[usize] {
        &self.parent_dims
    }

    /// Discrete parents, ascending
    pub fn discrete_parents(&self) -> &[DiscreteKey] {
        self.conditionals.keys()
    }

    /// Conditional tree
    pub fn conditionals(&self) -> &DecisionTree<MixtureLeaf> {
        &self.conditionals
    }

    /// Conditional selected by `assignment`
    ///
    /// # Errors
    /// - [`HybridError::MissingKey`] if a discrete parent is unassigned
    /// - [`HybridError::DegenerateAssignment`] at a singular leaf
    pub fn conditional(&self, assignment: &Assignment) -> Result<&GaussianConditional, HybridError> {
        self.conditionals.get(assignment)?.as_deref().ok_or_else(|| {
            HybridError::DegenerateAssignment {
                assignment: assignment.restrict(self.discrete_parents()).to_string(),
            }
        })
    }

    /// Log normalization constant per assignment; `-inf` at singular leaves
    pub fn log_normalizers(&self) -> DecisionTree<f64> {
        self.conditionals
            .apply(|c| c.as_ref().map_or(f64::NEG_INFINITY, |c| c.log_normalizer()))
    }

    /// Discrete factor holding `exp(log_normalizer)` per assignment
    pub fn normalizer_factor(&self) -> DiscreteFactor {
        DiscreteFactor::from_tree(self.log_normalizers().apply(|v| v.exp()))
    }

    /// Most likely frontal values under `assignment`
    pub fn solve(&self, continuous: &VectorValues, assignment: &Assignment) -> Result<VectorValues, HybridError> {
        self.conditional(assignment)?.solve(continuous)
    }

    /// Density at `values`; zero at singular leaves
    pub fn evaluate(&self, continuous: &VectorValues, assignment: &Assignment) -> Result<f64, HybridError> {
        match self.conditionals.get(assignment)? {
            Some(c) => c.evaluate(continuous),
            None => Ok(0.0),
        }
    }

    /// The mixture as a factor, each leaf converted with
    /// [`GaussianConditional::to_factor`]
    pub fn to_mixture_factor(&self) -> Result<MixtureFactor, HybridError> {
        let layout: Vec<(Key, usize)> = self
            .frontals
            .iter()
            .zip(self.frontal_dims.iter())
            .chain(self.parents.iter().zip(self.parent_dims.iter()))
            .map(|(k, d)| (*k, *d))
            .collect();
        let components = self
            .conditionals
            .apply(|c| -> MixtureComponent { c.as_ref().map(|c| Arc::new(c.to_factor())) });
        MixtureFactor::from_components(&layout, components)
    }

    /// Compare layouts and leaves with an absolute tolerance
    pub fn equals(&self, other: &GaussianMixture, tol: f64) -> bool {
        self.frontals == other.frontals
            && self.parents == other.parents
            && self
                .conditionals
                .equals_with(&other.conditionals, |a, b| match (a, b) {
                    (Some(a), Some(b)) => a.equals(b, tol),
                    (None, None) => true,
                    _ => false,
                })
    }
}

// ============================================================================
// HybridConditional
// ============================================================================

/// Result of eliminating one frontal set
#[derive(Debug, Clone)]
pub enum HybridConditional {
    /// Purely continuous conditional
    Gaussian(GaussianConditional),
    /// Continuous frontals with discrete parents
    Mixture(GaussianMixture),
    /// Discrete frontals
    Discrete(DiscreteConditional),
}

impl HybridConditional {
    /// Frontal keys in elimination order
    pub fn frontals(&self) -> Vec<Key> {
        match self {
            HybridConditional::Gaussian(c) => c.frontals().to_vec(),
            HybridConditional::Mixture(c) => c.frontals().to_vec(),
            HybridConditional::Discrete(c) => c.frontals().iter().map(|dk| dk.key).collect(),
        }
    }

    /// Continuous parents, ascending
    pub fn continuous_parents(&self) -> &[Key] {
        match self {
            HybridConditional::Gaussian(c) => c.parents(),
            HybridConditional::Mixture(c) => c.continuous_parents(),
            HybridConditional::Discrete(_) => &[],
        }
    }

    /// Discrete parents, ascending
    pub fn discrete_parents(&self) -> &[DiscreteKey] {
        match self {
            HybridConditional::Gaussian(_) => &[],
            HybridConditional::Mixture(c) => c.discrete_parents(),
            HybridConditional::Discrete(c) => c.parents(),
        }
    }

    /// Continuous parents, then discrete parents
    pub fn parents(&self) -> Vec<Key> {
        self.continuous_parents()
            .iter()
            .copied()
            .chain(self.discrete_parents().iter().map(|dk| dk.key))
            .collect()
    }

    /// Frontals followed by parents
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = self.frontals();
        keys.extend(self.parents());
        keys
    }

    /// Whether `key` is a frontal
    pub fn is_frontal(&self, key: Key) -> bool {
        self.frontals().contains(&key)
    }

    /// True for [`HybridConditional::Gaussian`]
    pub fn is_continuous(&self) -> bool {
        matches!(self, HybridConditional::Gaussian(_))
    }

    /// True for [`HybridConditional::Mixture`]
    pub fn is_hybrid(&self) -> bool {
        matches!(self, HybridConditional::Mixture(_))
    }

    /// True for [`HybridConditional::Discrete`]
    pub fn is_discrete(&self) -> bool {
        matches!(self, HybridConditional::Discrete(_))
    }

    /// Gaussian variant, if any
    pub fn as_gaussian(&self) -> Option<&GaussianConditional> {
        match self {
            HybridConditional::Gaussian(c) => Some(c),
            _ => None,
        }
    }

    /// Mixture variant, if any
    pub fn as_mixture(&self) -> Option<&GaussianMixture> {
        match self {
            HybridConditional::Mixture(c) => Some(c),
            _ => None,
        }
    }

    /// Discrete variant, if any
    pub fn as_discrete(&self) -> Option<&DiscreteConditional> {
        match self {
            HybridConditional::Discrete(c) => Some(c),
            _ => None,
        }
    }

    /// Density (continuous) or probability (discrete) at `values`
    pub fn evaluate(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self {
            HybridConditional::Gaussian(c) => c.evaluate(&values.continuous),
            HybridConditional::Mixture(c) => c.evaluate(&values.continuous, &values.discrete),
            HybridConditional::Discrete(c) => c.evaluate(&values.discrete),
        }
    }

    /// Most likely continuous frontal values given the parents in `values`
    ///
    /// Discrete conditionals yield no continuous values.
    pub fn solve(&self, values: &HybridValues) -> Result<VectorValues, HybridError> {
        match self {
            HybridConditional::Gaussian(c) => c.solve(&values.continuous),
            HybridConditional::Mixture(c) => c.solve(&values.continuous, &values.discrete),
            HybridConditional::Discrete(_) => Ok(VectorValues::new()),
        }
    }

    /// Convert back into factors whose product reproduces the conditional
    ///
    /// Under [`DiscreteWeighting::MarginalLikelihood`] a mixture also yields
    /// the discrete factor of its normalization constants, which cancels the
    /// integrated mass its re-elimination will add.
    pub fn to_factors(&self, weighting: DiscreteWeighting) -> Result<Vec<HybridFactor>, HybridError> {
        Ok(match self {
            HybridConditional::Gaussian(c) => vec![HybridFactor::Gaussian(c.to_factor())],
            HybridConditional::Mixture(c) => {
                let mut factors = vec![HybridFactor::Mixture(c.to_mixture_factor()?)];
                if !weighting.is_residual_only() {
                    factors.push(HybridFactor::Discrete(c.normalizer_factor()));
                }
                factors
            }
            HybridConditional::Discrete(c) => vec![HybridFactor::Discrete(c.to_factor())],
        })
    }

    /// Compare two conditionals of the same kind with an absolute tolerance
    pub fn equals(&self, other: &HybridConditional, tol: f64) -> bool {
        match (self, other) {
            (HybridConditional::Gaussian(a), HybridConditional::Gaussian(b)) => a.equals(b, tol),
            (HybridConditional::Mixture(a), HybridConditional::Mixture(b)) => a.equals(b, tol),
            (HybridConditional::Discrete(a), HybridConditional::Discrete(b)) => a.equals(b, tol),
            _ => false,
        }
    }
}

impl fmt::Display for HybridConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P(")?;
        for (i, key) in self.frontals().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        let parents = self.parents();
        if !parents.is_empty() {
            write!(f, " |")?;
            for key in parents {
                write!(f, " {}", key)?;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::shorthand::{m, x};
    use nalgebra::{DMatrix, DVector};

    fn leaf(r: f64, d: f64) -> MixtureLeaf {
        Some(Arc::new(
            GaussianConditional::new(
                vec![(x(1), 1)],
                vec![(x(2), 1)],
                DMatrix::from_element(1, 1, r),
                DMatrix::from_element(1, 1, -r),
                DVector::from_element(1, d),
            )
            .unwrap(),
        ))
    }

    fn mixture() -> GaussianMixture {
        let tree = DecisionTree::from_values(&[DiscreteKey::new(m(1), 2)], &[leaf(1.0, 0.0), leaf(2.0, 2.0)]).unwrap();
        GaussianMixture::new(tree).unwrap()
    }

    #[test]
    fn test_mixture_solve_per_assignment() {
        let mix = mixture();
        let parents = VectorValues::new().with(x(2), DVector::from_element(1, 1.0));
        let still = mix.solve(&parents, &Assignment::new().with(m(1), 0)).unwrap();
        let moving = mix.solve(&parents, &Assignment::new().with(m(1), 1)).unwrap();
        assert!((still.at(x(1)).unwrap()[0] - 1.0).abs() < 1e-12);
        assert!((moving.at(x(1)).unwrap()[0] - 2.0).abs() < 1e-12);
        assert_eq!(
            mix.solve(&parents, &Assignment::new()).unwrap_err(),
            HybridError::MissingKey { key: m(1) }
        );
    }

    #[test]
    fn test_degenerate_leaf() {
        let tree = DecisionTree::from_values(&[DiscreteKey::new(m(1), 2)], &[leaf(1.0, 0.0), None]).unwrap();
        let mix = GaussianMixture::new(tree).unwrap();
        let a1 = Assignment::new().with(m(1), 1);
        assert!(matches!(
            mix.conditional(&a1).unwrap_err(),
            HybridError::DegenerateAssignment { .. }
        ));
        let values = VectorValues::new()
            .with(x(1), DVector::from_element(1, 0.0))
            .with(x(2), DVector::from_element(1, 0.0));
        assert_eq!(mix.evaluate(&values, &a1).unwrap(), 0.0);
        assert_eq!(mix.normalizer_factor().evaluate(&a1).unwrap(), 0.0);

        let none = DecisionTree::from_values(&[DiscreteKey::new(m(1), 2)], &[None, None]).unwrap();
        assert!(GaussianMixture::new(none).is_err());
    }

    #[test]
    fn test_to_factors_marginal_likelihood_adds_normalizer() {
        let conditional = HybridConditional::Mixture(mixture());
        assert_eq!(conditional.parents(), vec![x(2), m(1)]);
        assert_eq!(conditional.to_string(), "P(x1 | x2 m1)");

        let residual = conditional.to_factors(DiscreteWeighting::ResidualEnergy).unwrap();
        assert_eq!(residual.len(), 1);
        let marginal = conditional.to_factors(DiscreteWeighting::MarginalLikelihood).unwrap();
        assert_eq!(marginal.len(), 2);
        let HybridFactor::Discrete(normalizer) = &marginal[1] else {
            panic!("expected a discrete normalizer");
        };
        // |R| / sqrt(2π) for R = 2
        let expected = 2.0 / (2.0 * std::f64::consts::PI).sqrt();
        let value = normalizer.evaluate(&Assignment::new().with(m(1), 1)).unwrap();
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_mixture_factor_round_trip_error() {
        let mix = mixture();
        let factor = mix.to_mixture_factor().unwrap();
        assert_eq!(factor.keys(), &[x(1), x(2)]);
        let values = VectorValues::new()
            .with(x(1), DVector::from_element(1, 0.5))
            .with(x(2), DVector::from_element(1, -0.5));
        let a = Assignment::new().with(m(1), 1);
        let expected = mix.conditional(&a).unwrap().error(&values).unwrap();
        assert!((factor.error(&values, &a).unwrap() - expected).abs() < 1e-12);
    }
}
