//! Hybrid Bayes tree and multifrontal elimination
//!
//! Multifrontal elimination runs in two passes:
//!
//! 1. **Symbolic**: eliminate the key scopes of the graph in ordering order to
//!    get every key's separator and its parent in the elimination tree, then
//!    merge single-child chains whose separators nest into cliques. A clique
//!    never mixes continuous and discrete frontals.
//! 2. **Numeric**: eliminate cliques bottom-up. Each clique receives the
//!    graph factors whose earliest ordered key it owns plus everything its
//!    children send up. Factors that do not touch the clique's frontals are
//!    forwarded to the parent unchanged.
//!
//! With the `rayon` feature sibling subtrees are eliminated in parallel.
//! Reporter callbacks are replayed afterwards in clique order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::EliminationConfig;
use crate::discrete::{discrete_marginal, Assignment, DiscreteFactor, Key};
use crate::errors::HybridError;
use crate::gaussian::VectorValues;
use crate::hybrid::conditional::{HybridConditional, HybridValues};
use crate::hybrid::elimination::{eliminate_frontals, HybridElimination};
use crate::hybrid::factor::HybridFactor;
use crate::hybrid::factor_graph::HybridFactorGraph;
use crate::hybrid::ordering::Ordering;
use crate::reporter::EliminationReporter;

// ============================================================================
// Bayes tree
// ============================================================================

/// One node of a [`HybridBayesTree`]
#[derive(Debug, Clone)]
pub struct Clique {
    /// Conditional on the clique's frontals given its separator
    pub conditional: Arc<HybridConditional>,
    /// Parent clique index, `None` for a root
    pub parent: Option<usize>,
    /// Child clique indices, ascending
    pub children: Vec<usize>,
}

impl Clique {
    /// Frontal keys
    pub fn frontals(&self) -> Vec<Key> {
        self.conditional.frontals()
    }

    /// Separator keys (the conditional's parents)
    pub fn separator(&self) -> Vec<Key> {
        self.conditional.parents()
    }

    /// Frontals and separator
    pub fn keys(&self) -> Vec<Key> {
        self.conditional.keys()
    }
}

/// Tree of cliques produced by multifrontal elimination
///
/// Cliques are indexed in elimination order, so a parent always has a larger
/// index than its children.
#[derive(Debug, Clone, Default)]
pub struct HybridBayesTree {
    cliques: Vec<Clique>,
    roots: Vec<usize>,
    clique_of: BTreeMap<Key, usize>,
}

impl HybridBayesTree {
    /// Number of cliques
    pub fn len(&self) -> usize {
        self.cliques.len()
    }

    /// True when the tree has no clique
    pub fn is_empty(&self) -> bool {
        self.cliques.is_empty()
    }

    /// Root clique indices, ascending
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Clique at `index`
    pub fn clique(&self, index: usize) -> Option<&Clique> {
        self.cliques.get(index)
    }

    /// All cliques in elimination order
    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    /// Children of the clique at `index`; empty for an unknown index
    pub fn children(&self, index: usize) -> &[usize] {
        self.cliques.get(index).map_or(&[], |c| c.children.as_slice())
    }

    /// Index of the clique with `key` among its frontals
    ///
    /// # Errors
    /// [`HybridError::NotEliminated`] if no clique eliminated `key`
    pub fn clique_containing(&self, key: Key) -> Result<usize, HybridError> {
        self.clique_of
            .get(&key)
            .copied()
            .ok_or(HybridError::NotEliminated { key })
    }

    /// Keys eliminated into the tree
    pub fn frontal_keys(&self) -> BTreeSet<Key> {
        self.clique_of.keys().copied().collect()
    }

    /// Conditionals in elimination order
    pub fn conditionals(&self) -> impl Iterator<Item = &HybridConditional> + '_ {
        self.cliques.iter().map(|c| c.conditional.as_ref())
    }

    /// Check that every child's separator lies within its parent's keys
    ///
    /// # Errors
    /// Structural error naming the first violating clique
    pub fn check_running_intersection(&self) -> Result<(), HybridError> {
        for (index, clique) in self.cliques.iter().enumerate() {
            let Some(parent) = clique.parent else {
                continue;
            };
            let parent_keys: BTreeSet<Key> = self.cliques[parent].keys().into_iter().collect();
            if let Some(key) = clique.separator().into_iter().find(|k| !parent_keys.contains(k)) {
                return Err(HybridError::structure(format!(
                    "clique {} ({}) has separator key {} missing from parent clique {} ({})",
                    index, clique.conditional, key, parent, self.cliques[parent].conditional
                )));
            }
        }
        Ok(())
    }

    /// Most likely continuous values under a fixed discrete assignment
    ///
    /// Solves from the roots down.
    pub fn optimize(&self, assignment: &Assignment) -> Result<VectorValues, HybridError> {
        let mut values = HybridValues::new(VectorValues::new(), assignment.clone());
        for clique in self.cliques.iter().rev() {
            if clique.conditional.is_discrete() {
                continue;
            }
            let solved = clique.conditional.solve(&values)?;
            values.continuous.extend(solved);
        }
        Ok(values.continuous)
    }

    /// Discrete clique conditionals as factors
    pub fn discrete_factors(&self) -> Vec<DiscreteFactor> {
        self.conditionals()
            .filter_map(|c| c.as_discrete().map(|d| d.to_factor()))
            .collect()
    }

    /// Normalized marginal of the discrete variable `key`
    ///
    /// # Errors
    /// [`HybridError::NotEliminated`] unless a discrete clique has `key` as
    /// frontal
    pub fn marginal_factor(&self, key: Key) -> Result<DiscreteFactor, HybridError> {
        let index = self.clique_containing(key)?;
        if !self.cliques[index].conditional.is_discrete() {
            return Err(HybridError::NotEliminated { key });
        }
        discrete_marginal(&self.discrete_factors(), key)
    }
}

// ============================================================================
// Symbolic pass
// ============================================================================

#[derive(Debug)]
struct SymbolicClique {
    frontals: Vec<Key>,
    parent: Option<usize>,
    children: Vec<usize>,
    factors: Vec<Arc<HybridFactor>>,
}

/// Cliques in elimination order and the factors no ordered key touches
fn symbolic_cliques(
    graph: &HybridFactorGraph,
    ordering: &Ordering,
) -> Result<(Vec<SymbolicClique>, Vec<Arc<HybridFactor>>), HybridError> {
    let continuous = graph.continuous_key_set();
    let is_continuous = |k: &Key| continuous.contains(k);

    // separator and elimination-tree parent of every ordered key
    let mut scopes: Vec<BTreeSet<Key>> = graph.iter().map(|f| f.keys().into_iter().collect()).collect();
    let mut separators: Vec<BTreeSet<Key>> = Vec::with_capacity(ordering.len());
    let mut etree_parent: Vec<Option<usize>> = Vec::with_capacity(ordering.len());
    for key in ordering.iter() {
        let (involved, rest): (Vec<_>, Vec<_>) = scopes.into_iter().partition(|s| s.contains(&key));
        scopes = rest;
        if involved.is_empty() {
            return Err(HybridError::Underdetermined { key });
        }
        let mut separator: BTreeSet<Key> = involved.into_iter().flatten().collect();
        separator.remove(&key);
        etree_parent.push(separator.iter().filter_map(|k| ordering.position(*k)).min());
        if !separator.is_empty() {
            scopes.push(separator.clone());
        }
        separators.push(separator);
    }

    let mut num_children = vec![0usize; ordering.len()];
    for parent in etree_parent.iter().flatten() {
        num_children[*parent] += 1;
    }

    // merge a key into its only child's clique when the separators nest
    let keys = ordering.keys();
    let mut clique_of_position: Vec<usize> = Vec::with_capacity(keys.len());
    let mut cliques: Vec<SymbolicClique> = Vec::new();
    for (position, key) in keys.iter().enumerate() {
        let only_child = if num_children[position] == 1 {
            etree_parent.iter().position(|p| *p == Some(position))
        } else {
            None
        };
        let merge_into = only_child.filter(|&child| {
            let clique = clique_of_position[child];
            cliques[clique].frontals.last() == Some(&keys[child])
                && separators[child].len() == separators[position].len() + 1
                && is_continuous(&keys[child]) == is_continuous(key)
        });
        match merge_into {
            Some(child) => {
                let clique = clique_of_position[child];
                cliques[clique].frontals.push(*key);
                clique_of_position.push(clique);
            }
            None => {
                clique_of_position.push(cliques.len());
                cliques.push(SymbolicClique {
                    frontals: vec![*key],
                    parent: None,
                    children: Vec::new(),
                    factors: Vec::new(),
                });
            }
        }
    }

    // the parent of a clique owns the first eliminated key of its separator
    for index in 0..cliques.len() {
        let last = cliques[index].frontals.last().copied();
        let parent = last
            .and_then(|k| ordering.position(k))
            .and_then(|p| etree_parent[p])
            .map(|p| clique_of_position[p]);
        cliques[index].parent = parent;
        if let Some(parent) = parent {
            cliques[parent].children.push(index);
        }
    }

    let mut unassigned = Vec::new();
    for factor in graph.factors() {
        let owner = factor
            .keys()
            .into_iter()
            .filter_map(|k| ordering.position(k))
            .min();
        match owner {
            Some(position) => cliques[clique_of_position[position]].factors.push(Arc::clone(factor)),
            None => unassigned.push(Arc::clone(factor)),
        }
    }
    Ok((cliques, unassigned))
}

// ============================================================================
// Numeric pass
// ============================================================================

struct SubtreeResult {
    /// Eliminated cliques of the subtree, children before parents
    eliminated: Vec<(usize, HybridElimination)>,
    /// Factors for the parent clique
    upward: Vec<Arc<HybridFactor>>,
}

fn eliminate_subtree(
    cliques: &[SymbolicClique],
    index: usize,
    config: &EliminationConfig,
) -> Result<SubtreeResult, HybridError> {
    let clique = &cliques[index];

    #[cfg(feature = "rayon")]
    let children: Vec<SubtreeResult> = clique
        .children
        .par_iter()
        .map(|&child| eliminate_subtree(cliques, child, config))
        .collect::<Result<_, _>>()?;

    #[cfg(not(feature = "rayon"))]
    let children: Vec<SubtreeResult> = clique
        .children
        .iter()
        .map(|&child| eliminate_subtree(cliques, child, config))
        .collect::<Result<_, _>>()?;

    let mut eliminated = Vec::new();
    let mut factors = clique.factors.clone();
    for child in children {
        eliminated.extend(child.eliminated);
        factors.extend(child.upward);
    }
    let (involved, mut upward): (Vec<_>, Vec<_>) =
        factors.into_iter().partition(|f| f.involves_any(&clique.frontals));
    let result = eliminate_frontals(&involved, &clique.frontals, config)?;
    log::trace!(
        "Clique {}: {} from {} factors",
        index,
        result.conditional,
        involved.len()
    );
    upward.extend(result.factors.iter().cloned().map(Arc::new));
    eliminated.push((index, result));
    Ok(SubtreeResult { eliminated, upward })
}

/// Multifrontal elimination of the keys of `ordering`
pub(crate) fn eliminate_multifrontal_impl<R>(
    graph: &HybridFactorGraph,
    ordering: &Ordering,
    config: &EliminationConfig,
    reporter: &mut R,
) -> Result<(HybridBayesTree, HybridFactorGraph), HybridError>
where
    R: EliminationReporter + ?Sized,
{
    graph.validate()?;
    let (symbolic, mut remaining) = symbolic_cliques(graph, ordering)?;
    let roots: Vec<usize> = (0..symbolic.len()).filter(|i| symbolic[*i].parent.is_none()).collect();

    #[cfg(feature = "rayon")]
    let results: Vec<SubtreeResult> = roots
        .par_iter()
        .map(|&root| eliminate_subtree(&symbolic, root, config))
        .collect::<Result<_, _>>()?;

    #[cfg(not(feature = "rayon"))]
    let results: Vec<SubtreeResult> = roots
        .iter()
        .map(|&root| eliminate_subtree(&symbolic, root, config))
        .collect::<Result<_, _>>()?;

    let mut eliminated: Vec<Option<HybridElimination>> = (0..symbolic.len()).map(|_| None).collect();
    for result in results {
        for (index, elimination) in result.eliminated {
            eliminated[index] = Some(elimination);
        }
        remaining.extend(result.upward);
    }

    let mut tree = HybridBayesTree {
        cliques: Vec::with_capacity(symbolic.len()),
        roots,
        clique_of: BTreeMap::new(),
    };
    for (index, (symbolic, elimination)) in symbolic.iter().zip(eliminated).enumerate() {
        let elimination = elimination
            .ok_or_else(|| HybridError::structure(format!("clique {} was never eliminated", index)))?;
        elimination.report(&symbolic.frontals, reporter);
        reporter.on_clique(index, &elimination.conditional);
        for key in &symbolic.frontals {
            tree.clique_of.insert(*key, index);
        }
        tree.cliques.push(Clique {
            conditional: Arc::new(elimination.conditional),
            parent: symbolic.parent,
            children: symbolic.children.clone(),
        });
    }
    log::debug!(
        "Multifrontal elimination: {} cliques, {} roots, {} factors remain",
        tree.len(),
        tree.roots.len(),
        remaining.len()
    );
    Ok((tree, HybridFactorGraph::from_shared(remaining)))
}
