//! Discrete factors
//!
//! A [`DiscreteFactor`] is an un-normalized potential over a set of discrete
//! keys, stored as a [`DecisionTree<f64>`].

use std::fmt;

use crate::common::constants::EPSILON_MASS;
use crate::discrete::key::{Assignment, DiscreteKey, Key};
use crate::discrete::tree::DecisionTree;
use crate::errors::HybridError;

/// Un-normalized potential over discrete keys
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteFactor {
    tree: DecisionTree<f64>,
}

impl DiscreteFactor {
    /// Factor from a row-major table over `keys` (last key fastest)
    ///
    /// # Errors
    /// Structural error if the table size does not match the keys
    pub fn new(keys: &[DiscreteKey], values: &[f64]) -> Result<Self, HybridError> {
        Ok(Self {
            tree: DecisionTree::from_values(keys, values)?,
        })
    }

    /// Wrap an existing tree of potentials
    pub fn from_tree(tree: DecisionTree<f64>) -> Self {
        Self { tree }
    }

    /// Factor with no keys
    pub fn constant(value: f64) -> Self {
        Self {
            tree: DecisionTree::leaf(value),
        }
    }

    /// Potentials as a decision tree
    pub fn tree(&self) -> &DecisionTree<f64> {
        &self.tree
    }

    /// Declared keys, ascending
    pub fn keys(&self) -> &[DiscreteKey] {
        self.tree.keys()
    }

    /// Whether the factor declares `key`
    pub fn involves(&self, key: Key) -> bool {
        self.keys().iter().any(|dk| dk.key == key)
    }

    /// Potential at `assignment`
    pub fn evaluate(&self, assignment: &Assignment) -> Result<f64, HybridError> {
        self.tree.get(assignment).copied()
    }

    /// Negative log potential at `assignment`
    pub fn error(&self, assignment: &Assignment) -> Result<f64, HybridError> {
        Ok(-self.evaluate(assignment)?.ln())
    }

    /// Pointwise product
    pub fn product(&self, other: &DiscreteFactor) -> Result<DiscreteFactor, HybridError> {
        Ok(Self {
            tree: self.tree.combine(&other.tree, |a, b| a * b)?,
        })
    }

    /// Product of many factors; the empty product is the constant one
    pub fn product_all<'a, I>(factors: I) -> Result<DiscreteFactor, HybridError>
    where
        I: IntoIterator<Item = &'a DiscreteFactor>,
    {
        factors
            .into_iter()
            .try_fold(DiscreteFactor::constant(1.0), |acc, f| acc.product(f))
    }

    /// Pointwise quotient; `0 / 0` is zero
    pub fn divide(&self, other: &DiscreteFactor) -> Result<DiscreteFactor, HybridError> {
        Ok(Self {
            tree: self
                .tree
                .combine(&other.tree, |a, b| if *b == 0.0 { 0.0 } else { a / b })?,
        })
    }

    /// Sum `key` out of the factor
    pub fn sum_out(&self, key: Key) -> Result<DiscreteFactor, HybridError> {
        Ok(Self {
            tree: self.tree.reduce_key(key, |a, b| a + b)?,
        })
    }

    /// Maximize `key` out of the factor
    pub fn max_out(&self, key: Key) -> Result<DiscreteFactor, HybridError> {
        Ok(Self {
            tree: self.tree.reduce_key(key, |a, b| a.max(*b))?,
        })
    }

    /// Sum out every key not listed in `keep`
    pub fn marginalize_to(&self, keep: &[Key]) -> Result<DiscreteFactor, HybridError> {
        let drop: Vec<Key> = self
            .keys()
            .iter()
            .map(|dk| dk.key)
            .filter(|k| !keep.contains(k))
            .collect();
        drop.into_iter().try_fold(self.clone(), |acc, k| acc.sum_out(k))
    }

    /// Multiply every potential by `scale`
    pub fn scaled(&self, scale: f64) -> DiscreteFactor {
        Self {
            tree: self.tree.apply(|v| v * scale),
        }
    }

    /// Total mass over all assignments of the declared keys
    pub fn total(&self) -> f64 {
        self.tree.iter().map(|(_, v)| *v).sum()
    }

    /// Factor rescaled to sum to one over its keys
    ///
    /// # Errors
    /// [`HybridError::SingularSystem`] if the total mass is zero
    pub fn normalized(&self) -> Result<DiscreteFactor, HybridError> {
        let total = self.total();
        if !total.is_finite() || total <= EPSILON_MASS {
            return Err(HybridError::singular(format!(
                "discrete factor over {} keys has total mass {}",
                self.keys().len(),
                total
            )));
        }
        Ok(self.scaled(1.0 / total))
    }

    /// Whether every potential is exactly one
    pub fn is_unit(&self) -> bool {
        self.tree.leaves().iter().all(|v| **v == 1.0)
    }

    /// Compare potentials with an absolute tolerance
    pub fn equals(&self, other: &DiscreteFactor, tol: f64) -> bool {
        self.tree
            .equals_with(&other.tree, |a, b| (a - b).abs() <= tol)
    }
}

impl fmt::Display for DiscreteFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiscreteFactor(")?;
        for (i, dk) in self.keys().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dk)?;
        }
        writeln!(f, ")")?;
        for (assignment, value) in self.tree.iter() {
            writeln!(f, "  {}: {:.6}", assignment, value)?;
        }
        Ok(())
    }
}
