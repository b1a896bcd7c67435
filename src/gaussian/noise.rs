//! Measurement noise models
//!
//! Gaussian factors are stored whitened: every row of `[A | b]` is divided by
//! the standard deviation of its measurement component, so the factor error
//! is always `0.5 * ||A x - b||^2`.

use nalgebra::{DMatrix, DVector};

use crate::errors::HybridError;

/// Diagonal measurement noise descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    /// Identity covariance of the given dimension
    Unit(usize),
    /// `sigma^2 * I`
    Isotropic {
        /// Measurement dimension
        dim: usize,
        /// Standard deviation shared by every component
        sigma: f64,
    },
    /// `diag(sigmas)^2`
    Diagonal {
        /// Per-component standard deviations
        sigmas: DVector<f64>,
    },
}

impl NoiseModel {
    /// Identity noise
    pub fn unit(dim: usize) -> Self {
        NoiseModel::Unit(dim)
    }

    /// Isotropic noise with standard deviation `sigma`
    pub fn isotropic(dim: usize, sigma: f64) -> Result<Self, HybridError> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(HybridError::structure(format!(
                "isotropic sigma must be positive, got {}",
                sigma
            )));
        }
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    /// Diagonal noise from per-component standard deviations
    pub fn diagonal(sigmas: DVector<f64>) -> Result<Self, HybridError> {
        if let Some(bad) = sigmas.iter().find(|s| !(**s > 0.0 && s.is_finite())) {
            return Err(HybridError::structure(format!(
                "diagonal sigma must be positive, got {}",
                bad
            )));
        }
        Ok(NoiseModel::Diagonal { sigmas })
    }

    /// Measurement dimension
    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Unit(dim) => *dim,
            NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal { sigmas } => sigmas.len(),
        }
    }

    /// Standard deviation of component `i`
    pub fn sigma(&self, i: usize) -> f64 {
        match self {
            NoiseModel::Unit(_) => 1.0,
            NoiseModel::Isotropic { sigma, .. } => *sigma,
            NoiseModel::Diagonal { sigmas } => sigmas[i],
        }
    }

    /// Divide row `i` of `matrix` by `sigma(i)`
    pub fn whiten_matrix(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = matrix.clone();
        if let NoiseModel::Unit(_) = self {
            return out;
        }
        for i in 0..out.nrows() {
            let scale = 1.0 / self.sigma(i);
            out.row_mut(i).scale_mut(scale);
        }
        out
    }

    /// Divide entry `i` of `vector` by `sigma(i)`
    pub fn whiten_vector(&self, vector: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            vector.len(),
            vector.iter().enumerate().map(|(i, v)| v / self.sigma(i)),
        )
    }
}
