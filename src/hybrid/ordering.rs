//! Elimination orderings
//!
//! An [`Ordering`] is a duplicate-free key sequence. The heuristics here are
//! greedy minimum-degree orderings over the variable interaction graph, with
//! an optional protected group forced to the end; hybrid graphs protect their
//! discrete keys so continuous variables are eliminated first.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::discrete::Key;
use crate::errors::HybridError;
use crate::hybrid::factor_graph::HybridFactorGraph;

/// Sequence of keys, each listed once
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ordering(Vec<Key>);

impl Ordering {
    /// Ordering from an explicit key sequence
    ///
    /// # Errors
    /// [`HybridError::DuplicateKey`] if a key is listed twice
    pub fn new<I>(keys: I) -> Result<Self, HybridError>
    where
        I: IntoIterator<Item = Key>,
    {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for key in keys {
            if !seen.insert(key) {
                return Err(HybridError::DuplicateKey { key });
            }
            out.push(key);
        }
        Ok(Self(out))
    }

    /// Keys in elimination order
    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `key` is listed
    pub fn contains(&self, key: Key) -> bool {
        self.0.contains(&key)
    }

    /// Position of `key`, if listed
    pub fn position(&self, key: Key) -> Option<usize> {
        self.0.iter().position(|k| *k == key)
    }

    /// Iterate in elimination order
    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        self.0.iter().copied()
    }

    /// Minimum-degree ordering of every key, `protected` keys last
    ///
    /// Protected keys absent from the graph are ignored. Ties go to the
    /// smaller key.
    pub fn constrained_last(graph: &HybridFactorGraph, protected: &[Key]) -> Self {
        let mut adjacency = interaction_graph(graph);
        let protected: BTreeSet<Key> = protected
            .iter()
            .copied()
            .filter(|k| adjacency.contains_key(k))
            .collect();
        let free: BTreeSet<Key> = adjacency
            .keys()
            .copied()
            .filter(|k| !protected.contains(k))
            .collect();
        let mut order = min_degree(&mut adjacency, free);
        order.extend(min_degree(&mut adjacency, protected));
        Self(order)
    }

    /// Continuous keys first, then discrete keys, each group by minimum degree
    pub fn hybrid(graph: &HybridFactorGraph) -> Self {
        let discrete: Vec<Key> = graph.discrete_key_set().into_iter().collect();
        Self::constrained_last(graph, &discrete)
    }

    /// Only the continuous keys, in the order [`Ordering::hybrid`] would use
    ///
    /// This is the partial ordering an incremental update needs.
    pub fn continuous(graph: &HybridFactorGraph) -> Self {
        let discrete = graph.discrete_key_set();
        Self(
            Self::hybrid(graph)
                .0
                .into_iter()
                .filter(|k| !discrete.contains(k))
                .collect(),
        )
    }
}

impl FromIterator<Key> for Ordering {
    /// Collects keys, keeping the first occurrence of a repeated key
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        let mut seen = BTreeSet::new();
        Self(iter.into_iter().filter(|k| seen.insert(*k)).collect())
    }
}

/// Undirected graph connecting keys that share a factor
fn interaction_graph(graph: &HybridFactorGraph) -> BTreeMap<Key, BTreeSet<Key>> {
    let mut adjacency: BTreeMap<Key, BTreeSet<Key>> = BTreeMap::new();
    for factor in graph.iter() {
        let keys = factor.keys();
        for a in &keys {
            let entry = adjacency.entry(*a).or_default();
            entry.extend(keys.iter().copied().filter(|b| b != a));
        }
    }
    adjacency
}

/// Greedy minimum-degree elimination of `candidates`, adding fill-in edges
fn min_degree(adjacency: &mut BTreeMap<Key, BTreeSet<Key>>, mut candidates: BTreeSet<Key>) -> Vec<Key> {
    let mut order = Vec::with_capacity(candidates.len());
    while let Some(next) = candidates
        .iter()
        .copied()
        .min_by_key(|k| (adjacency.get(k).map_or(0, |n| n.len()), *k))
    {
        candidates.remove(&next);
        let neighbours = adjacency.remove(&next).unwrap_or_default();
        for a in &neighbours {
            if let Some(set) = adjacency.get_mut(a) {
                set.remove(&next);
                set.extend(neighbours.iter().copied().filter(|b| b != a));
            }
        }
        order.push(next);
    }
    order
}
