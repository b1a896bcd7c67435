//! Dense QR elimination of Gaussian factors
//!
//! The factors touching a set of frontal keys are stacked into one augmented
//! system with columns ordered as `[frontals | separator | b]` and reduced to
//! upper-trapezoidal form. The top block rows form the conditional on the
//! frontals, the following rows form the separator factor, and anything left
//! below carries the residual energy of the system.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::common::linalg::{canonicalize_row_signs, triangularize};
use crate::discrete::Key;
use crate::errors::HybridError;
use crate::gaussian::conditional::GaussianConditional;
use crate::gaussian::factor::{DimVec, GaussianFactor, KeyVec};
use crate::gaussian::values::VectorValues;

/// Output of eliminating frontal keys from a set of Gaussian factors
#[derive(Debug, Clone)]
pub struct GaussianElimination {
    /// Conditional on the frontal keys given the separator
    pub conditional: GaussianConditional,
    /// Factor on the separator keys, `None` when there are none
    pub separator: Option<GaussianFactor>,
    /// `0.5 * ||r||^2` of the rows that involve no variable
    pub residual_energy: f64,
}

/// Column dimension of every key in `factors`
///
/// # Errors
/// [`HybridError::DimensionMismatch`] if a key has two different dimensions
pub fn collect_dims<'a, I>(factors: I) -> Result<BTreeMap<Key, usize>, HybridError>
where
    I: IntoIterator<Item = &'a GaussianFactor>,
{
    let mut dims = BTreeMap::new();
    for factor in factors {
        for (key, dim) in factor.keys().iter().zip(factor.dims().iter()) {
            match dims.get(key) {
                Some(expected) if expected != dim => {
                    return Err(HybridError::DimensionMismatch {
                        key: *key,
                        expected: *expected,
                        actual: *dim,
                    });
                }
                Some(_) => {}
                None => {
                    dims.insert(*key, *dim);
                }
            }
        }
    }
    Ok(dims)
}

/// Eliminate `frontals` (in order) from `factors`
///
/// # Arguments
/// * `factors` - Every factor involving a frontal key (others may be included)
/// * `frontals` - Keys to eliminate, in order
/// * `rank_tolerance` - |R_ii| at or below this marks the system singular
///
/// # Errors
/// - [`HybridError::Underdetermined`] if a frontal key appears in no factor
/// - [`HybridError::DimensionMismatch`] on inconsistent key dimensions
/// - [`HybridError::SingularSystem`] if the frontal block is rank deficient
pub fn eliminate_gaussian(
    factors: &[&GaussianFactor],
    frontals: &[Key],
    rank_tolerance: f64,
) -> Result<GaussianElimination, HybridError> {
    let dims = collect_dims(factors.iter().copied())?;
    for key in frontals {
        if !dims.contains_key(key) {
            return Err(HybridError::Underdetermined { key: *key });
        }
    }
    eliminate_gaussian_with_dims(factors, frontals, &dims, rank_tolerance)
}

/// Eliminate `frontals` with a fixed column layout
///
/// `dims` lists every key of the system, frontals included; keys that no
/// factor mentions get zero columns. Used when several selections of factors
/// (one per discrete assignment) must produce conditionals over identical
/// parents.
///
/// # Errors
/// - Structural error if a factor mentions a key missing from `dims`
/// - [`HybridError::SingularSystem`] if the frontal block is rank deficient
#[cfg_attr(all(feature = "hotpath", not(test)), hotpath::measure)]
pub fn eliminate_gaussian_with_dims(
    factors: &[&GaussianFactor],
    frontals: &[Key],
    dims: &BTreeMap<Key, usize>,
    rank_tolerance: f64,
) -> Result<GaussianElimination, HybridError> {
    for key in frontals {
        if !dims.contains_key(key) {
            return Err(HybridError::Underdetermined { key: *key });
        }
    }
    for factor in factors {
        for (key, dim) in factor.keys().iter().zip(factor.dims().iter()) {
            match dims.get(key) {
                None => {
                    return Err(HybridError::structure(format!(
                        "factor key {} is outside the elimination layout",
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

    // column layout: frontals in order, then separator keys ascending
    let mut layout: Vec<(Key, usize)> = frontals.iter().map(|k| (*k, dims[k])).collect();
    layout.extend(
        dims.iter()
            .filter(|(k, _)| !frontals.contains(k))
            .map(|(k, d)| (*k, *d)),
    );
    let mut offsets = BTreeMap::new();
    let mut n = 0;
    for (key, dim) in &layout {
        offsets.insert(*key, n);
        n += dim;
    }
    let n_f: usize = frontals.iter().map(|k| dims[k]).sum();
    let n_s = n - n_f;

    let m: usize = factors.iter().map(|f| f.rows()).sum();
    let mut ab = DMatrix::zeros(m, n + 1);
    let mut row = 0;
    for factor in factors {
        let src = factor.augmented();
        let mut col = 0;
        for (key, dim) in factor.keys().iter().zip(factor.dims().iter()) {
            let dst = offsets[key];
            ab.view_mut((row, dst), (factor.rows(), *dim))
                .copy_from(&src.view((0, col), (factor.rows(), *dim)));
            col += dim;
        }
        ab.view_mut((row, n), (factor.rows(), 1))
            .copy_from(&src.view((0, col), (factor.rows(), 1)));
        row += factor.rows();
    }

    let mut r = triangularize(ab);
    canonicalize_row_signs(&mut r);

    let context = || {
        let names: Vec<String> = frontals.iter().map(|k| k.to_string()).collect();
        format!("eliminating [{}]", names.join(", "))
    };
    if r.nrows() < n_f {
        return Err(HybridError::singular(format!(
            "{}: {} rows for {} unknowns",
            context(),
            r.nrows(),
            n_f
        )));
    }
    if let Some(i) = (0..n_f).find(|&i| r[(i, i)].abs() <= rank_tolerance) {
        return Err(HybridError::singular(format!(
            "{}: pivot {} is {:.3e}",
            context(),
            i,
            r[(i, i)]
        )));
    }

    let split = |keys: &[(Key, usize)]| -> (KeyVec, DimVec) { keys.iter().copied().unzip() };
    let (frontal_keys, frontal_dims) = split(&layout[..frontals.len()]);
    let (separator_keys, separator_dims) = split(&layout[frontals.len()..]);

    let conditional = GaussianConditional::from_parts(
        frontal_keys,
        frontal_dims,
        separator_keys.clone(),
        separator_dims.clone(),
        r.view((0, 0), (n_f, n_f)).into_owned(),
        r.view((0, n_f), (n_f, n_s)).into_owned(),
        r.view((0, n), (n_f, 1)).column(0).into_owned(),
    );

    let separator_end = r.nrows().min(n);
    let separator = if separator_keys.is_empty() {
        None
    } else {
        let rows = separator_end - n_f;
        Some(GaussianFactor::from_augmented(
            separator_keys,
            separator_dims,
            r.view((n_f, n_f), (rows, n_s + 1)).into_owned(),
        ))
    };

    let residual_energy = 0.5
        * (separator_end..r.nrows())
            .map(|i| r[(i, n)] * r[(i, n)])
            .sum::<f64>();

    Ok(GaussianElimination {
        conditional,
        separator,
        residual_energy,
    })
}

/// Sequentially eliminate a purely Gaussian graph
///
/// # Returns
/// Conditionals in elimination order and the factors over keys the ordering
/// does not mention
pub fn eliminate_gaussian_sequential(
    factors: &[GaussianFactor],
    ordering: &[Key],
    rank_tolerance: f64,
) -> Result<(Vec<GaussianConditional>, Vec<GaussianFactor>), HybridError> {
    let mut remaining: Vec<GaussianFactor> = factors.to_vec();
    let mut conditionals = Vec::with_capacity(ordering.len());
    for key in ordering {
        let (involved, rest): (Vec<_>, Vec<_>) =
            remaining.into_iter().partition(|f| f.involves(*key));
        remaining = rest;
        let refs: Vec<&GaussianFactor> = involved.iter().collect();
        let result = eliminate_gaussian(&refs, &[*key], rank_tolerance)?;
        conditionals.push(result.conditional);
        if let Some(separator) = result.separator.filter(|s| s.rows() > 0) {
            remaining.push(separator);
        }
    }
    Ok((conditionals, remaining))
}

/// Back-substitute conditionals in reverse order
///
/// `known` supplies values for parents that no conditional determines.
pub fn back_substitute(
    conditionals: &[GaussianConditional],
    known: &VectorValues,
) -> Result<VectorValues, HybridError> {
    let mut values = known.clone();
    for conditional in conditionals.iter().rev() {
        let solved = conditional.solve(&values)?;
        values.extend(solved);
    }
    Ok(values)
}
