//! Variable elimination over purely discrete factors
//!
//! Sum-product elimination produces discrete conditionals and marginals,
//! max-product elimination with back-substitution produces the most probable
//! assignment.

use std::collections::BTreeMap;

use crate::discrete::conditional::DiscreteConditional;
use crate::discrete::factor::DiscreteFactor;
use crate::discrete::key::{canonical_discrete_keys, Assignment, DiscreteKey, Key};
use crate::errors::HybridError;

/// Every key mentioned by `factors`, ascending, with consistent cardinalities
pub fn collect_discrete_keys(factors: &[DiscreteFactor]) -> Result<Vec<DiscreteKey>, HybridError> {
    let all: Vec<DiscreteKey> = factors.iter().flat_map(|f| f.keys().iter().copied()).collect();
    Ok(canonical_discrete_keys(&all)?.into_vec())
}

/// Remove the factors involving `key` from `factors`
fn take_involving(factors: &mut Vec<DiscreteFactor>, key: Key) -> Vec<DiscreteFactor> {
    let (involved, rest): (Vec<_>, Vec<_>) = factors.drain(..).partition(|f| f.involves(key));
    *factors = rest;
    involved
}

/// Eliminate one variable by sum-product
///
/// # Returns
/// The conditional on `key` and the separator factor over its neighbours
pub fn eliminate_sum_product(
    factors: &[DiscreteFactor],
    key: Key,
) -> Result<(DiscreteConditional, DiscreteFactor), HybridError> {
    if factors.is_empty() {
        return Err(HybridError::Underdetermined { key });
    }
    let joint = DiscreteFactor::product_all(factors)?;
    DiscreteConditional::from_joint(&joint, &[key])
}

/// Sequential sum-product elimination of `ordering`
///
/// # Returns
/// Conditionals in elimination order and the factors left over the keys the
/// ordering does not mention
pub fn eliminate_discrete(
    factors: &[DiscreteFactor],
    ordering: &[Key],
) -> Result<(Vec<DiscreteConditional>, Vec<DiscreteFactor>), HybridError> {
    collect_discrete_keys(factors)?;
    let mut remaining = factors.to_vec();
    let mut conditionals = Vec::with_capacity(ordering.len());
    for &key in ordering {
        let involved = take_involving(&mut remaining, key);
        let (conditional, separator) = eliminate_sum_product(&involved, key)?;
        log::trace!("Discrete elimination: {}", conditional);
        conditionals.push(conditional);
        if !separator.keys().is_empty() {
            remaining.push(separator);
        }
    }
    Ok((conditionals, remaining))
}

/// Normalized marginal of `key` under the product of `factors`
///
/// # Errors
/// [`HybridError::MissingKey`] if no factor mentions `key`
pub fn discrete_marginal(factors: &[DiscreteFactor], key: Key) -> Result<DiscreteFactor, HybridError> {
    let keys = collect_discrete_keys(factors)?;
    if !keys.iter().any(|dk| dk.key == key) {
        return Err(HybridError::MissingKey { key });
    }
    let mut remaining = factors.to_vec();
    for other in keys.iter().map(|dk| dk.key).filter(|k| *k != key) {
        let involved = take_involving(&mut remaining, other);
        let joint = DiscreteFactor::product_all(&involved)?;
        remaining.push(joint.sum_out(other)?);
    }
    DiscreteFactor::product_all(&remaining)?
        .marginalize_to(&[key])?
        .normalized()
}

/// Most probable joint assignment of every key in `factors`
///
/// Ties resolve to the lowest value of each key.
pub fn discrete_mpe(factors: &[DiscreteFactor]) -> Result<Assignment, HybridError> {
    let keys = collect_discrete_keys(factors)?;
    let mut remaining = factors.to_vec();
    let mut joints: Vec<(DiscreteKey, DiscreteFactor)> = Vec::with_capacity(keys.len());
    for dk in &keys {
        let involved = take_involving(&mut remaining, dk.key);
        let joint = DiscreteFactor::product_all(&involved)?;
        remaining.push(joint.max_out(dk.key)?);
        joints.push((*dk, joint));
    }

    let mut assignment = Assignment::new();
    for (dk, joint) in joints.iter().rev() {
        let mut best = (0, f64::NEG_INFINITY);
        for v in 0..dk.cardinality {
            let p = joint.evaluate(&assignment.clone().with(dk.key, v))?;
            if p > best.1 {
                best = (v, p);
            }
        }
        assignment.insert(dk.key, best.0);
    }
    Ok(assignment)
}

/// Brute-force normalized joint over all keys, for small problems and tests
pub fn discrete_joint(factors: &[DiscreteFactor]) -> Result<BTreeMap<Assignment, f64>, HybridError> {
    let joint = DiscreteFactor::product_all(factors)?.normalized()?;
    Ok(joint.tree().iter().map(|(a, v)| (a, *v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::key::shorthand::m;

    fn binary(i: u64) -> DiscreteKey {
        DiscreteKey::new(m(i), 2)
    }

    fn chain() -> Vec<DiscreteFactor> {
        vec![
            DiscreteFactor::new(&[binary(1)], &[0.3, 0.7]).unwrap(),
            DiscreteFactor::new(&[binary(1), binary(2)], &[0.9, 0.1, 0.2, 0.8]).unwrap(),
            DiscreteFactor::new(&[binary(2), binary(3)], &[0.5, 0.5, 0.1, 0.9]).unwrap(),
        ]
    }

    #[test]
    fn test_marginal_matches_brute_force() {
        let factors = chain();
        let joint = discrete_joint(&factors).unwrap();
        let marginal = discrete_marginal(&factors, m(2)).unwrap();
        for v in 0..2 {
            let expected: f64 = joint
                .iter()
                .filter(|(a, _)| a.get(m(2)) == Some(v))
                .map(|(_, p)| p)
                .sum();
            let actual = marginal.evaluate(&Assignment::new().with(m(2), v)).unwrap();
            assert!((actual - expected).abs() < 1e-12);
        }
        assert!((marginal.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mpe_matches_brute_force() {
        let factors = chain();
        let joint = discrete_joint(&factors).unwrap();
        let (best, _) = joint
            .iter()
            .fold((None, f64::NEG_INFINITY), |(ba, bp), (a, p)| {
                if *p > bp {
                    (Some(a.clone()), *p)
                } else {
                    (ba, bp)
                }
            });
        assert_eq!(discrete_mpe(&factors).unwrap(), best.unwrap());
    }

    #[test]
    fn test_eliminate_discrete_partial() {
        let (conditionals, remaining) = eliminate_discrete(&chain(), &[m(1)]).unwrap();
        assert_eq!(conditionals.len(), 1);
        assert_eq!(conditionals[0].frontals(), &[binary(1)]);
        assert_eq!(conditionals[0].parents(), &[binary(2)]);
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn test_eliminate_missing_variable() {
        let err = eliminate_discrete(&chain(), &[m(9)]).unwrap_err();
        assert_eq!(err, HybridError::Underdetermined { key: m(9) });
        let err = discrete_marginal(&chain(), m(9)).unwrap_err();
        assert_eq!(err, HybridError::MissingKey { key: m(9) });
    }

    #[test]
    fn test_cardinality_mismatch() {
        let factors = vec![
            DiscreteFactor::new(&[binary(1)], &[0.5, 0.5]).unwrap(),
            DiscreteFactor::new(&[DiscreteKey::new(m(1), 3)], &[0.2, 0.3, 0.5]).unwrap(),
        ];
        let err = eliminate_discrete(&factors, &[m(1)]).unwrap_err();
        assert!(matches!(err, HybridError::CardinalityMismatch { .. }));
    }
}
