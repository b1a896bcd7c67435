//! Measurement functions and linearization
//!
//! A [`Measurement`] predicts a residual `h(x) - z` from the current values
//! of its keys. Derivatives are requested explicitly through
//! [`JacobianRequest`] and come back inside the [`MeasurementEval`] result,
//! so callers that only need the residual never pay for Jacobians.
//!
//! [`linearize`] turns a measurement into a whitened [`GaussianFactor`] in
//! delta form: `A δ ≈ -r`, where `A` stacks the Jacobians and `r` is the
//! residual at the linearization point.

use nalgebra::{DMatrix, DVector};

use crate::discrete::{DecisionTree, DiscreteKey, Key};
use crate::errors::HybridError;
use crate::gaussian::factor::GaussianFactor;
use crate::gaussian::noise::NoiseModel;
use crate::gaussian::values::VectorValues;

/// Whether [`Measurement::evaluate`] should compute derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JacobianRequest {
    /// Residual only
    Skip,
    /// Residual and one Jacobian per key
    Compute,
}

/// Result of evaluating a measurement
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEval {
    /// Unwhitened residual `h(x) - z`
    pub residual: DVector<f64>,
    /// `d residual / d x_i` for every key, in key order, when requested
    pub jacobians: Option<Vec<DMatrix<f64>>>,
}

/// Nonlinear (or linear) measurement over continuous keys
pub trait Measurement: Send + Sync {
    /// Keys the measurement depends on
    fn keys(&self) -> &[Key];

    /// Noise model of the residual
    fn noise(&self) -> &NoiseModel;

    /// Evaluate the residual, and the Jacobians if requested
    fn evaluate(
        &self,
        values: &VectorValues,
        request: JacobianRequest,
    ) -> Result<MeasurementEval, HybridError>;

    /// Whitened squared error `0.5 * ||r / sigma||^2`
    fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        let eval = self.evaluate(values, JacobianRequest::Skip)?;
        Ok(0.5 * self.noise().whiten_vector(&eval.residual).norm_squared())
    }
}

/// Direct observation of one key: `x - mean`
#[derive(Debug, Clone)]
pub struct Prior {
    key: [Key; 1],
    mean: DVector<f64>,
    noise: NoiseModel,
}

impl Prior {
    /// Prior on `key` around `mean`
    pub fn new(key: Key, mean: DVector<f64>, noise: NoiseModel) -> Result<Self, HybridError> {
        if noise.dim() != mean.len() {
            return Err(HybridError::DimensionMismatch {
                key,
                expected: mean.len(),
                actual: noise.dim(),
            });
        }
        Ok(Self {
            key: [key],
            mean,
            noise,
        })
    }
}

impl Measurement for Prior {
    fn keys(&self) -> &[Key] {
        &self.key
    }

    fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    fn evaluate(
        &self,
        values: &VectorValues,
        request: JacobianRequest,
    ) -> Result<MeasurementEval, HybridError> {
        let key = self.key[0];
        let x = values.at(key)?;
        if x.len() != self.mean.len() {
            return Err(HybridError::DimensionMismatch {
                key,
                expected: self.mean.len(),
                actual: x.len(),
            });
        }
        let jacobians = match request {
            JacobianRequest::Skip => None,
            JacobianRequest::Compute => Some(vec![DMatrix::identity(x.len(), x.len())]),
        };
        Ok(MeasurementEval {
            residual: x - &self.mean,
            jacobians,
        })
    }
}

/// Relative measurement between two keys: `(x_to - x_from) - measured`
#[derive(Debug, Clone)]
pub struct Between {
    keys: [Key; 2],
    measured: DVector<f64>,
    noise: NoiseModel,
}

impl Between {
    /// Odometry-style constraint from `from` to `to`
    pub fn new(from: Key, to: Key, measured: DVector<f64>, noise: NoiseModel) -> Result<Self, HybridError> {
        if from == to {
            return Err(HybridError::structure(format!(
                "between measurement needs two distinct keys, got {} twice",
                from
            )));
        }
        if noise.dim() != measured.len() {
            return Err(HybridError::DimensionMismatch {
                key: to,
                expected: measured.len(),
                actual: noise.dim(),
            });
        }
        Ok(Self {
            keys: [from, to],
            measured,
            noise,
        })
    }

    /// Measured displacement
    pub fn measured(&self) -> &DVector<f64> {
        &self.measured
    }
}

impl Measurement for Between {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    fn evaluate(
        &self,
        values: &VectorValues,
        request: JacobianRequest,
    ) -> Result<MeasurementEval, HybridError> {
        let from = values.at(self.keys[0])?;
        let to = values.at(self.keys[1])?;
        let dim = self.measured.len();
        for (key, v) in [(self.keys[0], from), (self.keys[1], to)] {
            if v.len() != dim {
                return Err(HybridError::DimensionMismatch {
                    key,
                    expected: dim,
                    actual: v.len(),
                });
            }
        }
        let jacobians = match request {
            JacobianRequest::Skip => None,
            JacobianRequest::Compute => Some(vec![
                -DMatrix::<f64>::identity(dim, dim),
                DMatrix::identity(dim, dim),
            ]),
        };
        Ok(MeasurementEval {
            residual: (to - from) - &self.measured,
            jacobians,
        })
    }
}

/// Linearize `measurement` at `values` into a whitened Gaussian factor
///
/// # Errors
/// Structural error if the measurement returns no or misshaped Jacobians
pub fn linearize(measurement: &dyn Measurement, values: &VectorValues) -> Result<GaussianFactor, HybridError> {
    let eval = measurement.evaluate(values, JacobianRequest::Compute)?;
    let jacobians = eval.jacobians.ok_or_else(|| {
        HybridError::structure("measurement returned no Jacobians when asked for them")
    })?;
    if jacobians.len() != measurement.keys().len() {
        return Err(HybridError::structure(format!(
            "measurement returned {} Jacobians for {} keys",
            jacobians.len(),
            measurement.keys().len()
        )));
    }
    let terms = measurement.keys().iter().copied().zip(jacobians).collect();
    GaussianFactor::new(terms, -eval.residual, measurement.noise())
}

/// Linearize one measurement per discrete assignment
///
/// `components` lists the measurement for every assignment of
/// `discrete_keys` in row-major order (last key fastest).
///
/// # Returns
/// Decision tree of linearized components, ready for a mixture factor
pub fn linearize_mixture(
    discrete_keys: &[DiscreteKey],
    components: &[&dyn Measurement],
    values: &VectorValues,
) -> Result<DecisionTree<GaussianFactor>, HybridError> {
    let factors = components
        .iter()
        .map(|m| linearize(*m, values))
        .collect::<Result<Vec<_>, _>>()?;
    DecisionTree::from_values(discrete_keys, &factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::shorthand::{m, x};
    use crate::discrete::Assignment;

    fn at(values: &[(Key, f64)]) -> VectorValues {
        values
            .iter()
            .map(|(k, v)| (*k, DVector::from_element(1, *v)))
            .collect()
    }

    #[test]
    fn test_skip_returns_no_jacobians() {
        let prior = Prior::new(x(1), DVector::from_element(1, 0.0), NoiseModel::unit(1)).unwrap();
        let eval = prior.evaluate(&at(&[(x(1), 2.0)]), JacobianRequest::Skip).unwrap();
        assert!(eval.jacobians.is_none());
        assert_eq!(eval.residual[0], 2.0);
        assert!((prior.error(&at(&[(x(1), 2.0)])).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_linearize_prior_delta_form() {
        let noise = NoiseModel::isotropic(1, 0.1).unwrap();
        let prior = Prior::new(x(1), DVector::from_element(1, 0.0), noise).unwrap();
        let f = linearize(&prior, &at(&[(x(1), 1.0)])).unwrap();
        assert!((f.block(x(1)).unwrap()[(0, 0)] - 10.0).abs() < 1e-12);
        assert!((f.rhs()[0] + 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_linearize_between() {
        let between = Between::new(x(1), x(2), DVector::from_element(1, 1.0), NoiseModel::unit(1)).unwrap();
        let values = at(&[(x(1), 1.0), (x(2), 2.0)]);
        let f = linearize(&between, &values).unwrap();
        assert_eq!(f.keys(), &[x(1), x(2)]);
        assert_eq!(f.block(x(1)).unwrap()[(0, 0)], -1.0);
        assert_eq!(f.rhs()[0], 0.0);

        let still = Between::new(x(1), x(2), DVector::from_element(1, 0.0), NoiseModel::unit(1)).unwrap();
        assert_eq!(linearize(&still, &values).unwrap().rhs()[0], -1.0);
        assert!(Between::new(x(1), x(1), DVector::zeros(1), NoiseModel::unit(1)).is_err());
    }

    #[test]
    fn test_linearize_mixture() {
        let still = Between::new(x(1), x(2), DVector::from_element(1, 0.0), NoiseModel::unit(1)).unwrap();
        let moving = Between::new(x(1), x(2), DVector::from_element(1, 1.0), NoiseModel::unit(1)).unwrap();
        let mode = DiscreteKey::new(m(1), 2);
        let tree = linearize_mixture(&[mode], &[&still as &dyn Measurement, &moving], &at(&[(x(1), 1.0), (x(2), 2.0)])).unwrap();
        let f1 = tree.get(&Assignment::new().with(m(1), 1)).unwrap();
        assert_eq!(f1.rhs()[0], 0.0);
        let f0 = tree.get(&Assignment::new().with(m(1), 0)).unwrap();
        assert_eq!(f0.rhs()[0], -1.0);
    }
}
