//! Hybrid elimination
//!
//! [`eliminate_frontals`] eliminates one frontal set from the factors that
//! involve it, dispatching on the kind of the frontal variables:
//!
//! - **Continuous, no mixtures**: one dense QR elimination.
//! - **Continuous with mixtures**: one QR elimination per assignment of the
//!   mixtures' discrete keys, all over the same column layout. The
//!   conditionals form a [`GaussianMixture`], the separator rows form a new
//!   [`MixtureFactor`], and the per-assignment weights form a
//!   [`DiscreteFactor`]. A singular assignment becomes a degenerate leaf with
//!   weight zero instead of failing the whole step.
//! - **Discrete**: product of the incident discrete factors followed by
//!   sum-product elimination.
//!
//! The weight of assignment `a` is `exp(-E(a))`, where `E(a)` is the residual
//! energy of the eliminated system. Under
//! [`DiscreteWeighting::MarginalLikelihood`] it is also multiplied by the
//! integrated Gaussian mass `(2π)^{n/2} / |det R(a)|`.
//!
//! [`DiscreteWeighting::MarginalLikelihood`]: crate::config::DiscreteWeighting::MarginalLikelihood

use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::EliminationConfig;
use crate::discrete::key::merge_discrete_keys;
use crate::discrete::{Assignment, DecisionTree, DiscreteConditional, DiscreteFactor, DiscreteKeys, Key};
use crate::errors::HybridError;
use crate::gaussian::{
    collect_dims, eliminate_gaussian, eliminate_gaussian_with_dims, GaussianElimination, GaussianFactor,
};
use crate::hybrid::bayes_net::HybridBayesNet;
use crate::hybrid::conditional::{GaussianMixture, HybridConditional, MixtureLeaf};
use crate::hybrid::factor::{HybridFactor, MixtureComponent, MixtureFactor};
use crate::hybrid::factor_graph::HybridFactorGraph;
use crate::hybrid::ordering::Ordering;
use crate::reporter::EliminationReporter;

/// Result of eliminating one frontal set
#[derive(Debug, Clone)]
pub struct HybridElimination {
    /// Conditional on the frontal keys
    pub conditional: HybridConditional,
    /// New factors over the separator, to be pushed back into the graph
    pub factors: Vec<HybridFactor>,
    /// Assignments whose per-assignment system was singular
    pub degenerate: Vec<Assignment>,
}

impl HybridElimination {
    /// Forward the step to a reporter: degenerate leaves, the conditional,
    /// then the new factors
    pub fn report<R>(&self, frontals: &[Key], reporter: &mut R)
    where
        R: EliminationReporter + ?Sized,
    {
        for assignment in &self.degenerate {
            reporter.on_degenerate_assignment(frontals, assignment);
        }
        reporter.on_conditional(&self.conditional);
        for factor in &self.factors {
            reporter.on_separator(factor);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrontalKind {
    Continuous,
    Discrete,
}

/// Classify `frontals` by how the incident factors use them
fn frontal_kind(factors: &[Arc<HybridFactor>], frontals: &[Key]) -> Result<FrontalKind, HybridError> {
    let mut kind = None;
    for &key in frontals {
        let continuous = factors.iter().any(|f| f.continuous_keys().contains(&key));
        let discrete = factors
            .iter()
            .any(|f| f.discrete_keys().iter().any(|dk| dk.key == key));
        let this = match (continuous, discrete) {
            (true, false) => FrontalKind::Continuous,
            (false, true) => FrontalKind::Discrete,
            (false, false) => return Err(HybridError::Underdetermined { key }),
            (true, true) => {
                return Err(HybridError::structure(format!(
                    "{} is used as both a continuous and a discrete variable",
                    key
                )))
            }
        };
        match kind {
            None => kind = Some(this),
            Some(previous) if previous != this => {
                return Err(HybridError::structure(
                    "a frontal set mixes continuous and discrete variables",
                ))
            }
            Some(_) => {}
        }
    }
    kind.ok_or_else(|| HybridError::structure("empty frontal set"))
}

/// Eliminate `frontals` from `factors`
///
/// # Arguments
/// * `factors` - Every factor involving a frontal key; factors that do not
///   are passed through to the output unchanged
/// * `frontals` - Keys to eliminate jointly, all continuous or all discrete
/// * `config` - Weighting, rank tolerance and unit-factor policy
///
/// # Errors
/// - [`HybridError::Underdetermined`] if a frontal has no incident factor
/// - Structural error when a discrete frontal is still referenced by a
///   mixture, or the frontal set mixes variable kinds
/// - [`HybridError::SingularSystem`] if every assignment is singular
#[cfg_attr(all(feature = "hotpath", not(test)), hotpath::measure)]
pub fn eliminate_frontals(
    factors: &[Arc<HybridFactor>],
    frontals: &[Key],
    config: &EliminationConfig,
) -> Result<HybridElimination, HybridError> {
    match frontal_kind(factors, frontals)? {
        FrontalKind::Continuous => eliminate_continuous(factors, frontals, config),
        FrontalKind::Discrete => eliminate_discrete_frontals(factors, frontals),
    }
}

// ============================================================================
// Continuous frontals
// ============================================================================

fn eliminate_continuous(
    factors: &[Arc<HybridFactor>],
    frontals: &[Key],
    config: &EliminationConfig,
) -> Result<HybridElimination, HybridError> {
    let mut gaussians: Vec<&GaussianFactor> = Vec::new();
    let mut mixtures: Vec<&MixtureFactor> = Vec::new();
    let mut passthrough: Vec<HybridFactor> = Vec::new();
    for factor in factors {
        match factor.as_ref() {
            HybridFactor::Gaussian(g) if g.keys().iter().any(|k| frontals.contains(k)) => gaussians.push(g),
            HybridFactor::Mixture(m) if m.keys().iter().any(|k| frontals.contains(k)) => mixtures.push(m),
            other => passthrough.push(other.clone()),
        }
    }

    if mixtures.is_empty() {
        let result = eliminate_gaussian(&gaussians, frontals, config.rank_tolerance)?;
        let mut out = passthrough;
        if let Some(separator) = result.separator {
            out.push(HybridFactor::Gaussian(separator));
        }
        log::trace!(
            "Gaussian elimination of {}: residual {:.3e} dropped",
            result.conditional,
            result.residual_energy
        );
        return Ok(HybridElimination {
            conditional: HybridConditional::Gaussian(result.conditional),
            factors: out,
            degenerate: Vec::new(),
        });
    }

    let dims = layout_dims(&gaussians, &mixtures)?;
    for key in frontals {
        if !dims.contains_key(key) {
            return Err(HybridError::Underdetermined { key: *key });
        }
    }
    let discrete_keys = mixtures
        .iter()
        .try_fold(DiscreteKeys::new(), |acc, m| merge_discrete_keys(&acc, m.discrete_keys()))?;
    let assignments: Vec<Assignment> = Assignment::enumerate(&discrete_keys).collect();

    let eliminate_leaf = |assignment: &Assignment| -> Result<Option<GaussianElimination>, HybridError> {
        let mut selected = gaussians.clone();
        for mixture in &mixtures {
            match mixture.component(assignment)? {
                Some(component) => selected.push(component),
                None => return Ok(None),
            }
        }
        match eliminate_gaussian_with_dims(&selected, frontals, &dims, config.rank_tolerance) {
            Ok(result) => Ok(Some(result)),
            Err(HybridError::SingularSystem { context }) => {
                log::trace!("Degenerate leaf {}: {}", assignment, context);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    };

    #[cfg(feature = "rayon")]
    let results: Vec<Option<GaussianElimination>> = assignments
        .par_iter()
        .map(eliminate_leaf)
        .collect::<Result<_, _>>()?;

    #[cfg(not(feature = "rayon"))]
    let results: Vec<Option<GaussianElimination>> = assignments
        .iter()
        .map(eliminate_leaf)
        .collect::<Result<_, _>>()?;

    if results.iter().all(|r| r.is_none()) {
        let names: Vec<String> = frontals.iter().map(|k| k.to_string()).collect();
        return Err(HybridError::singular(format!(
            "every assignment is singular when eliminating [{}]",
            names.join(", ")
        )));
    }

    let mut degenerate = Vec::new();
    let mut conditionals: Vec<MixtureLeaf> = Vec::with_capacity(results.len());
    let mut separators: Vec<MixtureComponent> = Vec::with_capacity(results.len());
    let mut weights: Vec<f64> = Vec::with_capacity(results.len());
    for (assignment, result) in assignments.into_iter().zip(results) {
        match result {
            Some(result) => {
                let mut log_weight = -result.residual_energy;
                if !config.weighting.is_residual_only() {
                    log_weight -= result.conditional.log_normalizer();
                }
                weights.push(log_weight.exp());
                conditionals.push(Some(Arc::new(result.conditional)));
                separators.push(result.separator.map(Arc::new));
            }
            None => {
                weights.push(0.0);
                conditionals.push(None);
                separators.push(None);
                degenerate.push(assignment);
            }
        }
    }

    let mixture = GaussianMixture::new(DecisionTree::from_values(&discrete_keys, &conditionals)?)?;
    let mut out = passthrough;

    let separator_layout: Vec<(Key, usize)> = dims
        .iter()
        .filter(|(k, _)| !frontals.contains(k))
        .map(|(k, d)| (*k, *d))
        .collect();
    if !separator_layout.is_empty() {
        let tree = DecisionTree::from_values(&discrete_keys, &separators)?;
        out.push(HybridFactor::Mixture(MixtureFactor::from_components(
            &separator_layout,
            tree,
        )?));
    }

    let weight = DiscreteFactor::new(&discrete_keys, &weights)?;
    if config.drop_unit_factors && weight.is_unit() {
        log::trace!("Dropping unit weight over {} discrete keys", discrete_keys.len());
    } else {
        out.push(HybridFactor::Discrete(weight));
    }

    Ok(HybridElimination {
        conditional: HybridConditional::Mixture(mixture),
        factors: out,
        degenerate,
    })
}

/// Column dimensions of every continuous key in the plain factors and in
/// every mixture component
fn layout_dims(
    gaussians: &[&GaussianFactor],
    mixtures: &[&MixtureFactor],
) -> Result<BTreeMap<Key, usize>, HybridError> {
    let mut dims = collect_dims(gaussians.iter().copied())?;
    for mixture in mixtures {
        for (key, dim) in mixture.keys().iter().zip(mixture.dims()) {
            match dims.insert(*key, *dim) {
                Some(previous) if previous != *dim => {
                    return Err(HybridError::DimensionMismatch {
                        key: *key,
                        expected: previous,
                        actual: *dim,
                    })
                }
                _ => {}
            }
        }
    }
    Ok(dims)
}

// ============================================================================
// Discrete frontals
// ============================================================================

fn eliminate_discrete_frontals(
    factors: &[Arc<HybridFactor>],
    frontals: &[Key],
) -> Result<HybridElimination, HybridError> {
    let mut discrete: Vec<&DiscreteFactor> = Vec::new();
    let mut passthrough: Vec<HybridFactor> = Vec::new();
    for factor in factors {
        match factor.as_ref() {
            HybridFactor::Discrete(d) if frontals.iter().any(|k| d.involves(*k)) => discrete.push(d),
            HybridFactor::Mixture(m) if m.discrete_keys().iter().any(|dk| frontals.contains(&dk.key)) => {
                return Err(HybridError::structure(format!(
                    "cannot eliminate discrete {} while a mixture over [{}] still references it",
                    frontals
                        .iter()
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                    m.keys()
                        .iter()
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )))
            }
            other => passthrough.push(other.clone()),
        }
    }
    let joint = DiscreteFactor::product_all(discrete.iter().copied())?;
    let (conditional, separator) = DiscreteConditional::from_joint(&joint, frontals)?;
    let mut out = passthrough;
    if !separator.keys().is_empty() {
        out.push(HybridFactor::Discrete(separator));
    }
    Ok(HybridElimination {
        conditional: HybridConditional::Discrete(conditional),
        factors: out,
        degenerate: Vec::new(),
    })
}

// ============================================================================
// Sequential driver
// ============================================================================

/// Eliminate the keys of `ordering` one at a time
///
/// Factors produced by a step are appended to the working set, so the
/// remaining graph lists untouched input factors first, then produced
/// factors in creation order.
pub(crate) fn eliminate_sequential_impl<R>(
    graph: &HybridFactorGraph,
    ordering: &Ordering,
    config: &EliminationConfig,
    reporter: &mut R,
) -> Result<(HybridBayesNet, HybridFactorGraph), HybridError>
where
    R: EliminationReporter + ?Sized,
{
    graph.validate()?;
    let mut remaining: Vec<Arc<HybridFactor>> = graph.factors().to_vec();
    let mut net = HybridBayesNet::new();
    for key in ordering.iter() {
        let (involved, rest): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|f| f.involves(key));
        remaining = rest;
        if involved.is_empty() {
            return Err(HybridError::Underdetermined { key });
        }
        let result = eliminate_frontals(&involved, &[key], config)?;
        log::debug!(
            "Eliminated {} from {} factors, {} new",
            result.conditional,
            involved.len(),
            result.factors.len()
        );
        result.report(&[key], reporter);
        remaining.extend(result.factors.into_iter().map(Arc::new));
        net.push(result.conditional);
    }
    Ok((net, HybridFactorGraph::from_shared(remaining)))
}
