//! Gaussian conditional densities
//!
//! A [`GaussianConditional`] represents `p(x_f | x_p)` through the
//! square-root information form `R x_f + S x_p = d` with unit noise:
//!
//! `p(x_f | x_p) = exp(log_normalizer - 0.5 * ||R x_f + S x_p - d||^2)`
//!
//! `R` is upper triangular with a strictly positive diagonal.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::common::constants::HALF_LN_2PI;
use crate::common::linalg::{log_abs_det_triangular, matrices_close, solve_upper_triangular, vectors_close};
use crate::discrete::Key;
use crate::errors::HybridError;
use crate::gaussian::factor::{DimVec, GaussianFactor, KeyVec};
use crate::gaussian::values::VectorValues;

/// Square-root information form of a Gaussian conditional
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianConditional {
    frontals: KeyVec,
    frontal_dims: DimVec,
    parents: KeyVec,
    parent_dims: DimVec,
    r: DMatrix<f64>,
    s: DMatrix<f64>,
    d: DVector<f64>,
}

impl GaussianConditional {
    /// Create a conditional from its blocks
    ///
    /// # Errors
    /// Structural error if block shapes disagree with the key dimensions;
    /// [`HybridError::SingularSystem`] if `R` has a zero diagonal entry
    pub fn new(
        frontals: Vec<(Key, usize)>,
        parents: Vec<(Key, usize)>,
        r: DMatrix<f64>,
        s: DMatrix<f64>,
        d: DVector<f64>,
    ) -> Result<Self, HybridError> {
        let (frontals, frontal_dims): (KeyVec, DimVec) = frontals.into_iter().unzip();
        let (parents, parent_dims): (KeyVec, DimVec) = parents.into_iter().unzip();
        let n_f: usize = frontal_dims.iter().sum();
        let n_p: usize = parent_dims.iter().sum();
        if r.shape() != (n_f, n_f) || s.shape() != (n_f, n_p) || d.len() != n_f {
            return Err(HybridError::structure(format!(
                "conditional blocks R {:?}, S {:?}, d {} do not match dims ({}, {})",
                r.shape(),
                s.shape(),
                d.len(),
                n_f,
                n_p
            )));
        }
        if let Some(i) = (0..n_f).find(|&i| r[(i, i)] == 0.0) {
            return Err(HybridError::singular(format!(
                "conditional on {} has zero pivot at row {}",
                frontals.first().map(|k| k.to_string()).unwrap_or_default(),
                i
            )));
        }
        Ok(Self {
            frontals,
            frontal_dims,
            parents,
            parent_dims,
            r,
            s,
            d,
        })
    }

    /// Assemble from an already validated triangular layout
    pub(crate) fn from_parts(
        frontals: KeyVec,
        frontal_dims: DimVec,
        parents: KeyVec,
        parent_dims: DimVec,
        r: DMatrix<f64>,
        s: DMatrix<f64>,
        d: DVector<f64>,
    ) -> Self {
        Self {
            frontals,
            frontal_dims,
            parents,
            parent_dims,
            r,
            s,
            d,
        }
    }

    /// Frontal keys in elimination order
    pub fn frontals(&self) -> &[Key] {
        &self.frontals
    }

    /// Frontal dimensions
    pub fn frontal_dims(&self) -> &[usize] {
        &self.frontal_dims
    }

    /// Continuous parent keys, ascending
    pub fn parents(&self) -> &[Key] {
        &self.parents
    }

    /// Parent dimensions
    pub fn parent_dims(&self) -> &[usize] {
        &self.parent_dims
    }

    /// Upper-triangular frontal block
    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Parent block
    pub fn s(&self) -> &DMatrix<f64> {
        &self.s
    }

    /// Right-hand side
    pub fn d(&self) -> &DVector<f64> {
        &self.d
    }

    /// Total frontal dimension
    pub fn dim(&self) -> usize {
        self.r.nrows()
    }

    /// Stacked parent vector in parent order
    fn stack_parents(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let n_p: usize = self.parent_dims.iter().sum();
        let mut stacked = DVector::zeros(n_p);
        let mut offset = 0;
        for (key, dim) in self.parents.iter().zip(self.parent_dims.iter()) {
            let v = values.at(*key)?;
            if v.len() != *dim {
                return Err(HybridError::DimensionMismatch {
                    key: *key,
                    expected: *dim,
                    actual: v.len(),
                });
            }
            stacked.rows_mut(offset, *dim).copy_from(v);
            offset += dim;
        }
        Ok(stacked)
    }

    /// Stacked frontal vector in frontal order
    fn stack_frontals(&self, values: &VectorValues) -> Result<DVector<f64>, HybridError> {
        let mut stacked = DVector::zeros(self.dim());
        let mut offset = 0;
        for (key, dim) in self.frontals.iter().zip(self.frontal_dims.iter()) {
            let v = values.at(*key)?;
            if v.len() != *dim {
                return Err(HybridError::DimensionMismatch {
                    key: *key,
                    expected: *dim,
                    actual: v.len(),
                });
            }
            stacked.rows_mut(offset, *dim).copy_from(v);
            offset += dim;
        }
        Ok(stacked)
    }

    /// Most likely frontal values given the parents in `values`
    ///
    /// Solves `R x_f = d - S x_p` by back-substitution.
    ///
    /// # Errors
    /// [`HybridError::MissingKey`] if a parent has no value
    pub fn solve(&self, values: &VectorValues) -> Result<VectorValues, HybridError> {
        let rhs = if self.parents.is_empty() {
            self.d.clone()
        } else {
            &self.d - &self.s * self.stack_parents(values)?
        };
        let x = solve_upper_triangular(&self.r, &rhs).ok_or_else(|| {
            HybridError::singular(format!("back-substitution for {}", self))
        })?;
        let mut out = VectorValues::new();
        let mut offset = 0;
        for (key, dim) in self.frontals.iter().zip(self.frontal_dims.iter()) {
            out.insert(*key, x.rows(offset, *dim).into_owned());
            offset += dim;
        }
        Ok(out)
    }

    /// `0.5 * ||R x_f + S x_p - d||^2`
    pub fn error(&self, values: &VectorValues) -> Result<f64, HybridError> {
        let mut r = &self.r * self.stack_frontals(values)? - &self.d;
        if !self.parents.is_empty() {
            r += &self.s * self.stack_parents(values)?;
        }
        Ok(0.5 * r.norm_squared())
    }

    /// Log of the density normalization constant
    ///
    /// `sum_i ln|R_ii| - (n / 2) ln(2π)`
    pub fn log_normalizer(&self) -> f64 {
        log_abs_det_triangular(&self.r) - self.dim() as f64 * HALF_LN_2PI
    }

    /// Log density at `values`
    pub fn log_density(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.log_normalizer() - self.error(values)?)
    }

    /// Density at `values`
    pub fn evaluate(&self, values: &VectorValues) -> Result<f64, HybridError> {
        Ok(self.log_density(values)?.exp())
    }

    /// The conditional as a whitened factor `[R S | d]`
    ///
    /// The factor's error equals the conditional's error.
    pub fn to_factor(&self) -> GaussianFactor {
        let n_f = self.dim();
        let n_p = self.s.ncols();
        let mut ab = DMatrix::zeros(n_f, n_f + n_p + 1);
        ab.view_mut((0, 0), (n_f, n_f)).copy_from(&self.r);
        ab.view_mut((0, n_f), (n_f, n_p)).copy_from(&self.s);
        ab.column_mut(n_f + n_p).copy_from(&self.d);
        let mut keys = self.frontals.clone();
        keys.extend(self.parents.iter().copied());
        let mut dims = self.frontal_dims.clone();
        dims.extend(self.parent_dims.iter().copied());
        GaussianFactor::from_augmented(keys, dims, ab)
    }

    /// Compare keys and blocks with an absolute tolerance
    pub fn equals(&self, other: &GaussianConditional, tol: f64) -> bool {
        self.frontals == other.frontals
            && self.parents == other.parents
            && self.frontal_dims == other.frontal_dims
            && self.parent_dims == other.parent_dims
            && matrices_close(&self.r, &other.r, tol)
            && matrices_close(&self.s, &other.s, tol)
            && vectors_close(&self.d, &other.d, tol)
    }
}

impl fmt::Display for GaussianConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p(")?;
        for (i, k) in self.frontals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", k)?;
        }
        if !self.parents.is_empty() {
            write!(f, " |")?;
            for k in &self.parents {
                write!(f, " {}", k)?;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::shorthand::x;

    fn scalar(v: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, v)
    }

    fn example() -> GaussianConditional {
        // 2 x1 + 1 x2 = 4
        GaussianConditional::new(
            vec![(x(1), 1)],
            vec![(x(2), 1)],
            scalar(2.0),
            scalar(1.0),
            DVector::from_element(1, 4.0),
        )
        .unwrap()
    }

    #[test]
    fn test_solve() {
        let c = example();
        let parents = VectorValues::new().with(x(2), DVector::from_element(1, 2.0));
        let sol = c.solve(&parents).unwrap();
        assert!((sol.at(x(1)).unwrap()[0] - 1.0).abs() < 1e-12);
        assert_eq!(
            c.solve(&VectorValues::new()).unwrap_err(),
            HybridError::MissingKey { key: x(2) }
        );
    }

    #[test]
    fn test_density_normalizes() {
        let c = GaussianConditional::new(
            vec![(x(1), 1)],
            vec![],
            scalar(2.0),
            DMatrix::zeros(1, 0),
            DVector::from_element(1, 0.0),
        )
        .unwrap();
        // sigma = 0.5, crude quadrature over [-5, 5]
        let step = 1e-3;
        let mass: f64 = (0..10_000)
            .map(|i| {
                let v = -5.0 + step * i as f64;
                let values = VectorValues::new().with(x(1), DVector::from_element(1, v));
                c.evaluate(&values).unwrap() * step
            })
            .sum();
        assert!((mass - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_to_factor_error_matches() {
        let c = example();
        let values = VectorValues::new()
            .with(x(1), DVector::from_element(1, 0.3))
            .with(x(2), DVector::from_element(1, -1.0));
        let f = c.to_factor();
        assert_eq!(f.keys(), &[x(1), x(2)]);
        assert!((f.error(&values).unwrap() - c.error(&values).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_zero_pivot() {
        let err = GaussianConditional::new(
            vec![(x(1), 1)],
            vec![],
            scalar(0.0),
            DMatrix::zeros(1, 0),
            DVector::from_element(1, 0.0),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Numeric);
    }
}
