//! Linear-Gaussian factors
//!
//! A [`GaussianFactor`] stores the whitened augmented Jacobian `[A_1 ... A_k | b]`
//! of a linear least-squares term over continuous keys. Its error is
//! `0.5 * ||sum_i A_i x_i - b||^2`.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;

use crate::common::linalg::matrices_close;
use crate::discrete::Key;
use crate::errors::HybridError;
use crate::gaussian::noise::NoiseModel;
use crate::gaussian::values::VectorValues;

/// Key list of a Gaussian factor or conditional
pub type KeyVec = SmallVec<[Key; 4]>;
/// Per-key dimensions matching a [`KeyVec`]
pub type DimVec = SmallVec<[usize; 4]>;

/// Whitened linear system over continuous keys
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianFactor {
    keys: KeyVec,
    dims: DimVec,
    ab: DMatrix<f64>,
}

impl GaussianFactor {
    /// Factor from Jacobian blocks, a right-hand side and a noise model
    ///
    /// # Arguments
    /// * `terms` - `(key, A_i)` pairs; every block must have `b.len()` rows
    /// * `b` - Right-hand side
    /// * `noise` - Noise model of dimension `b.len()`
    ///
    /// # Errors
    /// Structural error on repeated keys or mismatched row counts
    pub fn new(
        terms: Vec<(Key, DMatrix<f64>)>,
        b: DVector<f64>,
        noise: &NoiseModel,
    ) -> Result<Self, HybridError> {
        let rows = b.len();
        if noise.dim() != rows {
            return Err(HybridError::structure(format!(
                "noise model has dimension {}, right-hand side has {} rows",
                noise.dim(),
                rows
            )));
        }
        let mut keys = KeyVec::new();
        let mut dims = DimVec::new();
        for (key, block) in &terms {
            if keys.contains(key) {
                return Err(HybridError::structure(format!(
                    "key {} appears twice in one factor",
                    key
                )));
            }
            if block.nrows() != rows {
                return Err(HybridError::structure(format!(
                    "block for {} has {} rows, expected {}",
                    key,
                    block.nrows(),
                    rows
                )));
            }
            keys.push(*key);
            dims.push(block.ncols());
        }
        let cols: usize = dims.iter().sum();
        let mut ab = DMatrix::zeros(rows, cols + 1);
        let mut offset = 0;
        for (_, block) in &terms {
            ab.view_mut((0, offset), (rows, block.ncols()))
                .copy_from(&noise.whiten_matrix(block));
            offset += block.ncols();
        }
        ab.column_mut(cols).copy_from(&noise.whiten_vector(&b));
        Ok(Self { keys, dims, ab })
    }

    /// Factor from already whitened blocks (unit noise)
    pub fn whitened(terms: Vec<(Key, DMatrix<f64>)>, b: DVector<f64>) -> Result<Self, HybridError> {
        let noise = NoiseModel::unit(b.len());
        Self::new(terms, b, &noise)
    }

    /// Factor from a whitened augmented matrix laid out by `keys` and `dims`
    pub(crate) fn from_augmented(keys: KeyVec, dims: DimVec, ab: DMatrix<f64>) -> Self {
        debug_assert_eq!(dims.iter().sum::<usize>() + 1, ab.ncols());
        Self { keys, dims, ab }
    }

    /// Keys in column order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Column dimension of each key
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Column dimension of `key`, if involved
    pub fn dim(&self, key: Key) -> Option<usize> {
        self.keys.iter().position(|k| *k == key).map(|i| self.dims[i])
    }

    /// Whether the factor involves `key`
    pub fn involves(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.ab.nrows()
    }

    /// Whitened augmented matrix `[A | b]`
    pub fn augmented(&self) -> &DMatrix<f64> {
        &self.ab
    }

    /// First column of `key`'s block
    fn offset(&self, index: usize) -> usize {
        self.dims[..index].iter().sum()
    }

    /// Whitened Jacobian block of `key`
    pub fn block(&self, key: Key) -> Option<DMatrix<f64>> {
        let index = self.keys.iter().position(|k| *k == key)?;
        let offset = self.offset(index);
        Some(
            self.ab
                .view((0, offset), (self.rows(), self.dims[index]))
                .into_owned(),
        )
    }

    /// Whitened right-hand side
    pub fn rhs(&self) -> DVector<f64> {
        self.ab.column(self.ab.ncols() - 1).into_owned()
    }

    /// Whitened residual `A x - b`
    pub fn residual(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let mut r = -self.rhs();
        for (i, key) in self.keys.iter().enumerate() {
            let x = values.at(*key)?;
            if x.len() != self.dims[i] {
                return Err(HybridError::DimensionMismatch {
                    key: *key,
                    expected: self.dims[i],
                    actual: x.len(),
                });
            }
            let offset = self.offset(i);
            r += self.ab.view((0, offset), (self.rows(), self.dims[i])) * x;
        }
        Ok(r)
    }

    /// `0.5 * ||A x - b||^2`
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(0.5 * self.residual(values)?.norm_squared())
    }

    /// Compare with an absolute tolerance on the augmented matrix
    pub fn equals(&self, other: &GaussianFactor, tol: f64) -> bool {
        self.keys == other.keys && self.dims == other.dims && matrices_close(&self.ab, &other.ab, tol)
    }
}

impl fmt::Display for GaussianFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GaussianFactor(")?;
        for (i, k) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", k)?;
        }
        write!(f, "; {} rows)", self.rows())
    }
}
