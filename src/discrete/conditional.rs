//! Discrete conditionals `P(frontals | parents)`

use std::fmt;

use crate::discrete::factor::DiscreteFactor;
use crate::discrete::key::{canonical_discrete_keys, Assignment, DiscreteKey, DiscreteKeys, Key};
use crate::discrete::tree::DecisionTree;
use crate::errors::HybridError;

/// Conditional probability table over frontal and parent discrete keys
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteConditional {
    frontals: DiscreteKeys,
    parents: DiscreteKeys,
    table: DecisionTree<f64>,
}

impl DiscreteConditional {
    /// Conditional from a joint potential over `frontals` and parents
    ///
    /// Returns the conditional and the separator factor (the joint with the
    /// frontals summed out). Parent assignments with zero mass get an all-zero
    /// row.
    pub fn from_joint(
        joint: &DiscreteFactor,
        frontals: &[Key],
    ) -> Result<(DiscreteConditional, DiscreteFactor), HybridError> {
        let mut frontal_keys = DiscreteKeys::new();
        for key in frontals {
            let dk = joint
                .keys()
                .iter()
                .find(|dk| dk.key == *key)
                .copied()
                .ok_or(HybridError::Underdetermined { key: *key })?;
            frontal_keys.push(dk);
        }
        let separator = frontals
            .iter()
            .try_fold(joint.clone(), |acc, k| acc.sum_out(*k))?;
        let conditional = joint.divide(&separator)?;
        let parents = joint
            .keys()
            .iter()
            .copied()
            .filter(|dk| !frontals.contains(&dk.key))
            .collect();
        Ok((
            DiscreteConditional {
                frontals: frontal_keys,
                parents,
                table: conditional.tree().clone(),
            },
            separator,
        ))
    }

    /// Conditional of one frontal from ratio rows such as `"1/2 3/2"`
    ///
    /// One whitespace-separated row per parent assignment (row-major over
    /// `parents`, last parent fastest); each row lists `/`-separated weights
    /// over the frontal values and is normalized independently.
    pub fn from_spec(
        frontal: DiscreteKey,
        parents: &[DiscreteKey],
        spec: &str,
    ) -> Result<DiscreteConditional, HybridError> {
        let rows: Vec<&str> = spec.split_whitespace().collect();
        let expected_rows: usize = parents.iter().map(|dk| dk.cardinality).product();
        if rows.len() != expected_rows {
            return Err(HybridError::structure(format!(
                "spec for {} has {} rows, parents need {}",
                frontal.key,
                rows.len(),
                expected_rows
            )));
        }
        let mut values = Vec::with_capacity(expected_rows * frontal.cardinality);
        for row in rows {
            let weights = row
                .split('/')
                .map(|w| {
                    w.parse::<f64>().map_err(|_| {
                        HybridError::structure(format!("invalid weight '{}' for {}", w, frontal.key))
                    })
                })
                .collect::<Result<Vec<f64>, HybridError>>()?;
            if weights.len() != frontal.cardinality {
                return Err(HybridError::CardinalityMismatch {
                    key: frontal.key,
                    expected: frontal.cardinality,
                    actual: weights.len(),
                });
            }
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                return Err(HybridError::structure(format!(
                    "row '{}' for {} has no mass",
                    row, frontal.key
                )));
            }
            values.extend(weights.iter().map(|w| w / total));
        }
        // table declared parents first, frontal fastest
        let mut declared: Vec<DiscreteKey> = parents.to_vec();
        declared.push(frontal);
        let table = DecisionTree::from_values(&declared, &values)?;
        let mut frontals = DiscreteKeys::new();
        frontals.push(frontal);
        Ok(DiscreteConditional {
            frontals,
            parents: canonical_discrete_keys(parents)?,
            table,
        })
    }

    /// Frontal keys in elimination order
    pub fn frontals(&self) -> &[DiscreteKey] {
        &self.frontals
    }

    /// Parent keys, ascending
    pub fn parents(&self) -> &[DiscreteKey] {
        &self.parents
    }

    /// Probability table over frontals and parents
    pub fn table(&self) -> &DecisionTree<f64> {
        &self.table
    }

    /// `P(frontals | parents)` at a full assignment
    pub fn evaluate(&self, assignment: &Assignment) -> Result<f64, HybridError> {
        self.table.get(assignment).copied()
    }

    /// Most probable frontal values given the parent values in `parents`
    ///
    /// Ties resolve to the lowest frontal assignment.
    pub fn argmax(&self, parents: &Assignment) -> Result<Assignment, HybridError> {
        for dk in &self.parents {
            parents.require(dk.key)?;
        }
        let mut best: Option<(Assignment, f64)> = None;
        for frontal in Assignment::enumerate(&self.frontals) {
            let p = self.evaluate(&parents.merged(&frontal))?;
            if best.as_ref().map_or(true, |(_, b)| p > *b) {
                best = Some((frontal, p));
            }
        }
        Ok(best.map(|(a, _)| a).unwrap_or_default())
    }

    /// The table as an un-normalized factor
    pub fn to_factor(&self) -> DiscreteFactor {
        DiscreteFactor::from_tree(self.table.clone())
    }

    /// Compare with an absolute tolerance on probabilities
    pub fn equals(&self, other: &DiscreteConditional, tol: f64) -> bool {
        self.frontals == other.frontals
            && self.parents == other.parents
            && self
                .table
                .equals_with(&other.table, |a, b| (a - b).abs() <= tol)
    }
}

impl fmt::Display for DiscreteConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P(")?;
        for (i, dk) in self.frontals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dk.key)?;
        }
        if !self.parents.is_empty() {
            write!(f, " |")?;
            for dk in &self.parents {
                write!(f, " {}", dk.key)?;
            }
        }
        write!(f, ")")
    }
}
