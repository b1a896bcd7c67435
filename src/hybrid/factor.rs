//! Hybrid factors
//!
//! [`HybridFactor`] is the closed set of factor kinds a hybrid graph holds:
//! plain Gaussian factors, discrete potentials, and [`MixtureFactor`]s whose
//! Gaussian form is selected by a discrete assignment. Elimination matches on
//! the variant rather than downcasting.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::discrete::{Assignment, DecisionTree, DiscreteFactor, DiscreteKey, Key};
use crate::errors::HybridError;
use crate::gaussian::{collect_dims, DimVec, GaussianFactor, KeyVec, VectorValues};
use crate::hybrid::conditional::HybridValues;

/// One leaf of a mixture: `None` marks an assignment with zero probability
pub type MixtureComponent = Option<Arc<GaussianFactor>>;

// ============================================================================
// MixtureFactor
// ============================================================================

/// Gaussian factor selected by a discrete assignment
///
/// Components may involve different subsets of the declared continuous keys.
/// A `None` component contributes infinite error.
#[derive(Debug, Clone)]
pub struct MixtureFactor {
    keys: KeyVec,
    dims: DimVec,
    components: DecisionTree<MixtureComponent>,
}

impl MixtureFactor {
    /// Mixture over the union of the components' continuous keys
    ///
    /// # Errors
    /// [`HybridError::DimensionMismatch`] if components disagree on a key's
    /// dimension
    pub fn new(components: DecisionTree<GaussianFactor>) -> Result<Self, HybridError> {
        let dims = collect_dims(components.leaves())?;
        let components = components.apply(|f| Some(Arc::new(f.clone())));
        Ok(Self::from_layout(&dims, components))
    }

    /// Mixture with an explicit continuous key layout
    ///
    /// # Errors
    /// - Structural error if a component mentions a key outside `keys` or no
    ///   component is present at all
    /// - [`HybridError::DimensionMismatch`] on inconsistent dimensions
    pub fn from_components(
        keys: &[(Key, usize)],
        components: DecisionTree<MixtureComponent>,
    ) -> Result<Self, HybridError> {
        let layout: BTreeMap<Key, usize> = keys.iter().copied().collect();
        let mut present = 0;
        for component in components.leaves().into_iter().filter_map(|c| c.as_deref()) {
            present += 1;
            for (key, dim) in component.keys().iter().zip(component.dims().iter()) {
                match layout.get(key) {
                    None => {
                        return Err(HybridError::structure(format!(
                            "mixture component involves undeclared key {}",
                            key
                        )))
                    }
                    Some(expected) if expected != dim => {
                        return Err(HybridError::DimensionMismatch {
                            key: *key,
                            expected: *expected,
                            actual: *dim,
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        if present == 0 {
            return Err(HybridError::structure("mixture has no admissible component"));
        }
        Ok(Self::from_layout(&layout, components))
    }

    fn from_layout(layout: &BTreeMap<Key, usize>, components: DecisionTree<MixtureComponent>) -> Self {
        let (keys, dims) = layout.iter().map(|(k, d)| (*k, *d)).unzip();
        Self {
            keys,
            dims,
            components,
        }
    }

    /// Continuous keys, ascending
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Dimensions matching [`MixtureFactor::keys`]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Discrete keys selecting the component, ascending
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        self.components.keys()
    }

    /// Component tree
    pub fn components(&self) -> &DecisionTree<MixtureComponent> {
        &self.components
    }

    /// Component selected by `assignment`
    pub fn component(&self, assignment: &Assignment) -> Result<Option<&GaussianFactor>, HybridError> {
        Ok(self.components.get(assignment)?.as_deref())
    }

    /// Whether the continuous part involves `key`
    pub fn involves(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    /// Error of the selected component; infinite for a degenerate leaf
    pub fn error(&self, continuous: &VectorValues, assignment: &Assignment) -> Result<f64, HybridError> {
        match self.component(assignment)? {
            Some(factor) => factor.error(continuous),
            None => Ok(f64::INFINITY),
        }
    }

    /// Compare layouts and every component with an absolute tolerance
    pub fn equals(&self, other: &MixtureFactor, tol: f64) -> bool {
        self.keys == other.keys
            && self.dims == other.dims
            && self
                .components
                .equals_with(&other.components, |a, b| match (a, b) {
                    (Some(a), Some(b)) => a.equals(b, tol),
                    (None, None) => true,
                    _ => false,
                })
    }
}

// ============================================================================
// HybridFactor
// ============================================================================

/// Any factor of a hybrid graph
#[derive(Debug, Clone)]
pub enum HybridFactor {
    /// Linear-Gaussian factor over continuous keys
    Gaussian(GaussianFactor),
    /// Potential over discrete keys
    Discrete(DiscreteFactor),
    /// Gaussian factor selected by discrete keys
    Mixture(MixtureFactor),
}

impl HybridFactor {
    /// Continuous keys
    pub fn continuous_keys(&self) -> &[Key] {
        match self {
            HybridFactor::Gaussian(f) => f.keys(),
            HybridFactor::Discrete(_) => &[],
            HybridFactor::Mixture(f) => f.keys(),
        }
    }

    /// Dimensions matching [`HybridFactor::continuous_keys`]
    pub fn continuous_dims(&self) -> &[usize] {
        match self {
            HybridFactor::Gaussian(f) => f.dims(),
            HybridFactor::Discrete(_) => &[],
            HybridFactor::Mixture(f) => f.dims(),
        }
    }

    /// Discrete keys, ascending
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        match self {
            HybridFactor::Gaussian(_) => &[],
            HybridFactor::Discrete(f) => f.keys(),
            HybridFactor::Mixture(f) => f.discrete_keys(),
        }
    }

    /// Continuous keys followed by discrete keys
    pub fn keys(&self) -> Vec<Key> {
        self.continuous_keys()
            .iter()
            .copied()
            .chain(self.discrete_keys().iter().map(|dk| dk.key))
            .collect()
    }

    /// Whether the factor involves `key` (continuous or discrete)
    pub fn involves(&self, key: Key) -> bool {
        self.continuous_keys().contains(&key) || self.discrete_keys().iter().any(|dk| dk.key == key)
    }

    /// Whether the factor involves any of `keys`
    pub fn involves_any(&self, keys: &[Key]) -> bool {
        keys.iter().any(|k| self.involves(*k))
    }

    /// True for [`HybridFactor::Gaussian`]
    pub fn is_continuous(&self) -> bool {
        matches!(self, HybridFactor::Gaussian(_))
    }

    /// True for [`HybridFactor::Discrete`]
    pub fn is_discrete(&self) -> bool {
        matches!(self, HybridFactor::Discrete(_))
    }

    /// True for [`HybridFactor::Mixture`]
    pub fn is_hybrid(&self) -> bool {
        matches!(self, HybridFactor::Mixture(_))
    }

    /// Negative log of the un-normalized factor value
    pub fn error(&self, values: &HybridValues) -> Result<f64, HybridError> {
        match self {
            HybridFactor::Gaussian(f) => f.error(&values.continuous),
            HybridFactor::Discrete(f) => f.error(&values.discrete),
            HybridFactor::Mixture(f) => f.error(&values.continuous, &values.discrete),
        }
    }

    /// Compare two factors of the same kind with an absolute tolerance
    pub fn equals(&self, other: &HybridFactor, tol: f64) -> bool {
        match (self, other) {
            (HybridFactor::Gaussian(a), HybridFactor::Gaussian(b)) => a.equals(b, tol),
            (HybridFactor::Discrete(a), HybridFactor::Discrete(b)) => a.equals(b, tol),
            (HybridFactor::Mixture(a), HybridFactor::Mixture(b)) => a.equals(b, tol),
            _ => false,
        }
    }
}

impl From<GaussianFactor> for HybridFactor {
    fn from(factor: GaussianFactor) -> Self {
        HybridFactor::Gaussian(factor)
    }
}

impl From<DiscreteFactor> for HybridFactor {
    fn from(factor: DiscreteFactor) -> Self {
        HybridFactor::Discrete(factor)
    }
}

impl From<MixtureFactor> for HybridFactor {
    fn from(factor: MixtureFactor) -> Self {
        HybridFactor::Mixture(factor)
    }
}

impl fmt::Display for HybridFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            HybridFactor::Gaussian(_) => "Gaussian",
            HybridFactor::Discrete(_) => "Discrete",
            HybridFactor::Mixture(_) => "Mixture",
        };
        write!(f, "{}(", kind)?;
        for (i, key) in self.keys().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        write!(f, ")")
    }
}
