//! Linear algebra utilities
//!
//! Dense helpers shared by Gaussian elimination and conditional
//! back-substitution.

use nalgebra::{DMatrix, DVector};

/// Upper-triangularize an augmented system `[A | b]` with Householder QR
///
/// Returns the `min(m, n) x n` upper-trapezoidal factor `R` such that
/// `||A x - b||^2 = ||R_A x - R_b||^2 + const` for every `x`. Rows beyond the
/// rank of `A` carry the irreducible residual in their last column.
///
/// # Arguments
/// * `augmented` - Stacked whitened rows, right-hand side in the last column
///
/// # Returns
/// Upper-trapezoidal factor with the same number of columns
pub fn triangularize(augmented: DMatrix<f64>) -> DMatrix<f64> {
    if augmented.nrows() == 0 || augmented.ncols() == 0 {
        return DMatrix::zeros(0, augmented.ncols());
    }
    let mut r = augmented.qr().r();
    // exact zeros below the diagonal
    for i in 0..r.nrows() {
        for j in 0..i.min(r.ncols()) {
            r[(i, j)] = 0.0;
        }
    }
    r
}

/// Flip the sign of every row whose leading diagonal entry is negative
///
/// The row `i` is inspected at column `i`. Rows shorter than that are left as
/// is. Negating a row of `[R | d]` leaves the least-squares system unchanged,
/// so this makes elimination results canonical.
pub fn canonicalize_row_signs(r: &mut DMatrix<f64>) {
    for i in 0..r.nrows().min(r.ncols()) {
        if r[(i, i)] < 0.0 {
            let mut row = r.row_mut(i);
            row.neg_mut();
        }
    }
}

/// Solve `R x = rhs` for upper-triangular `R` by back-substitution
///
/// # Returns
/// `None` if a diagonal entry is exactly zero
pub fn solve_upper_triangular(r: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    r.solve_upper_triangular(rhs)
}

/// Sum of `ln|d_i|` over the diagonal of a square upper-triangular matrix
pub fn log_abs_det_triangular(r: &DMatrix<f64>) -> f64 {
    r.diagonal().iter().map(|d| d.abs().ln()).sum()
}

/// Check whether two matrices agree entrywise within `tol`
pub fn matrices_close(a: &DMatrix<f64>, b: &DMatrix<f64>, tol: f64) -> bool {
    a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
}

/// Check whether two vectors agree entrywise within `tol`
pub fn vectors_close(a: &DVector<f64>, b: &DVector<f64>, tol: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
}
