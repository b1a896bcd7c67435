//! Persistent decision trees over discrete assignments
//!
//! A [`DecisionTree`] maps every complete assignment of its declared discrete
//! keys to one leaf. Nodes are reference counted and never mutated, so
//! `apply`, `combine` and `restrict` return new trees that share untouched
//! subtrees with their inputs.
//!
//! Along every root-to-leaf path, choice nodes appear in ascending key order.
//! A path may skip a key when all of its branches would be the same subtree;
//! `combine` collapses such nodes when it detects them by pointer identity.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use crate::discrete::key::{
    canonical_discrete_keys, merge_discrete_keys, num_assignments, Assignment, DiscreteKey,
    DiscreteKeys, Key,
};
use crate::errors::HybridError;

#[derive(Debug)]
enum Node<L> {
    Leaf(L),
    Choice {
        key: Key,
        branches: Vec<Arc<Node<L>>>,
    },
}

impl<L> Node<L> {
    fn id(node: &Arc<Node<L>>) -> usize {
        Arc::as_ptr(node) as usize
    }

    /// Child reached by `key = value`, or the node itself if it does not
    /// split on `key`
    fn descend(node: &Arc<Node<L>>, key: Key, value: usize) -> &Arc<Node<L>> {
        match node.as_ref() {
            Node::Choice { key: k, branches } if *k == key => &branches[value],
            _ => node,
        }
    }
}

/// Immutable, structurally shared mapping from assignments to leaves
pub struct DecisionTree<L> {
    keys: DiscreteKeys,
    root: Arc<Node<L>>,
}

impl<L> Clone for DecisionTree<L> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            root: Arc::clone(&self.root),
        }
    }
}

impl<L: fmt::Debug> fmt::Debug for DecisionTree<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionTree")
            .field("keys", &self.keys)
            .field("root", &self.root)
            .finish()
    }
}

impl<L> DecisionTree<L> {
    /// Tree with no keys and a single leaf
    pub fn leaf(value: L) -> Self {
        Self {
            keys: DiscreteKeys::new(),
            root: Arc::new(Node::Leaf(value)),
        }
    }

    /// Tree that branches on `key` into the given subtrees
    ///
    /// Subtrees must only declare keys greater than `key`. Identical subtrees
    /// (same shared node) collapse into one.
    pub fn choice(key: DiscreteKey, children: Vec<DecisionTree<L>>) -> Result<Self, HybridError> {
        if key.cardinality == 0 {
            return Err(HybridError::structure(format!(
                "discrete key {} has cardinality zero",
                key.key
            )));
        }
        if children.len() != key.cardinality {
            return Err(HybridError::CardinalityMismatch {
                key: key.key,
                expected: key.cardinality,
                actual: children.len(),
            });
        }
        let mut keys = DiscreteKeys::new();
        keys.push(key);
        for child in &children {
            if child.keys.iter().any(|dk| dk.key <= key.key) {
                return Err(HybridError::structure(format!(
                    "subtree of {} branches on a key that does not follow it",
                    key.key
                )));
            }
            keys = merge_discrete_keys(&keys, &child.keys)?;
        }
        let branches: Vec<Arc<Node<L>>> = children.into_iter().map(|c| c.root).collect();
        let root = match branches.first() {
            Some(first) if branches.iter().all(|b| Arc::ptr_eq(first, b)) => Arc::clone(first),
            _ => Arc::new(Node::Choice {
                key: key.key,
                branches,
            }),
        };
        Ok(Self { keys, root })
    }

    /// Build a tree by evaluating `f` at every assignment of `keys`
    pub fn from_fn<F>(keys: &[DiscreteKey], mut f: F) -> Result<Self, HybridError>
    where
        F: FnMut(&Assignment) -> L,
    {
        Self::try_from_fn(keys, |a| Ok(f(a)))
    }

    /// Build a tree from a fallible leaf function
    pub fn try_from_fn<F>(keys: &[DiscreteKey], mut f: F) -> Result<Self, HybridError>
    where
        F: FnMut(&Assignment) -> Result<L, HybridError>,
    {
        let keys = canonical_discrete_keys(keys)?;
        let mut assignment = Assignment::new();
        let root = build_node(&keys, 0, &mut assignment, &mut f)?;
        Ok(Self { keys, root })
    }

    /// Declared keys, ascending
    pub fn keys(&self) -> &[DiscreteKey] {
        &self.keys
    }

    /// Number of complete assignments of the declared keys
    pub fn num_assignments(&self) -> usize {
        num_assignments(&self.keys)
    }

    /// Leaf selected by `assignment`
    ///
    /// Extra keys in the assignment are ignored.
    ///
    /// # Errors
    /// [`HybridError::MissingKey`] if a key the path branches on is unassigned
    pub fn get(&self, assignment: &Assignment) -> Result<&L, HybridError> {
        let mut node = &self.root;
        loop {
            match node.as_ref() {
                Node::Leaf(value) => return Ok(value),
                Node::Choice { key, branches } => {
                    let v = assignment.require(*key)?;
                    node = branches.get(v).ok_or_else(|| {
                        HybridError::structure(format!(
                            "value {} out of range for {} (cardinality {})",
                            v,
                            key,
                            branches.len()
                        ))
                    })?;
                }
            }
        }
    }

    /// Leaf at a complete assignment produced by enumerating the own keys
    fn leaf_at(&self, assignment: &Assignment) -> &L {
        let mut node = &self.root;
        loop {
            match node.as_ref() {
                Node::Leaf(value) => return value,
                Node::Choice { key, branches } => {
                    node = &branches[assignment.get(*key).unwrap_or(0)];
                }
            }
        }
    }

    /// Every assignment of the declared keys with its leaf, last key fastest
    pub fn iter(&self) -> impl Iterator<Item = (Assignment, &L)> + '_ {
        Assignment::enumerate(&self.keys).map(move |a| {
            let leaf = self.leaf_at(&a);
            (a, leaf)
        })
    }

    /// Distinct leaves in depth-first order
    pub fn leaves(&self) -> Vec<&L> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !seen.insert(Node::id(node)) {
                continue;
            }
            match node.as_ref() {
                Node::Leaf(value) => out.push(value),
                Node::Choice { branches, .. } => stack.extend(branches.iter().rev()),
            }
        }
        out
    }

    /// Number of distinct leaf nodes
    pub fn num_leaves(&self) -> usize {
        self.leaves().len()
    }

    /// Map every leaf through `f`, preserving shape and sharing
    pub fn apply<M, F>(&self, f: F) -> DecisionTree<M>
    where
        F: Fn(&L) -> M,
    {
        let mut memo = HashMap::new();
        let root = match apply_node::<L, M, Infallible, _>(&self.root, &|l| Ok(f(l)), &mut memo) {
            Ok(root) => root,
            Err(never) => match never {},
        };
        DecisionTree {
            keys: self.keys.clone(),
            root,
        }
    }

    /// Fallible [`DecisionTree::apply`]
    pub fn try_apply<M, E, F>(&self, f: F) -> Result<DecisionTree<M>, E>
    where
        F: Fn(&L) -> Result<M, E>,
    {
        let mut memo = HashMap::new();
        let root = apply_node(&self.root, &f, &mut memo)?;
        Ok(DecisionTree {
            keys: self.keys.clone(),
            root,
        })
    }

    /// Map every leaf through `f`, also passing the leaf's full assignment
    ///
    /// The result is expanded to one leaf per assignment.
    pub fn apply_with_assignment<M, F>(&self, f: F) -> DecisionTree<M>
    where
        F: Fn(&Assignment, &L) -> M,
    {
        let mut assignment = Assignment::new();
        let root = match build_node::<M, Infallible, _>(
            &self.keys,
            0,
            &mut assignment,
            &mut |a: &Assignment| Ok(f(a, self.leaf_at(a))),
        ) {
            Ok(root) => root,
            Err(never) => match never {},
        };
        DecisionTree {
            keys: self.keys.clone(),
            root,
        }
    }

    /// Pointwise combination over the union of both key sets
    ///
    /// # Errors
    /// [`HybridError::CardinalityMismatch`] if a shared key has different
    /// cardinalities in the two trees
    pub fn combine<R, M, F>(&self, other: &DecisionTree<R>, f: F) -> Result<DecisionTree<M>, HybridError>
    where
        F: Fn(&L, &R) -> M,
    {
        let keys = merge_discrete_keys(&self.keys, &other.keys)?;
        let mut memo = HashMap::new();
        let root = combine_node(&self.root, &other.root, &f, &mut memo);
        Ok(DecisionTree { keys, root })
    }

    /// Fix the keys present in `assignment`, dropping them from the tree
    pub fn restrict(&self, assignment: &Assignment) -> Result<DecisionTree<L>, HybridError> {
        let keys = self
            .keys
            .iter()
            .copied()
            .filter(|dk| !assignment.contains(dk.key))
            .collect();
        let mut memo = HashMap::new();
        let root = restrict_node(&self.root, assignment, &mut memo)?;
        Ok(DecisionTree { keys, root })
    }

    /// Compare two trees leaf by leaf with a custom predicate
    pub fn equals_with<F>(&self, other: &DecisionTree<L>, f: F) -> bool
    where
        F: Fn(&L, &L) -> bool,
    {
        self.keys == other.keys
            && self
                .iter()
                .all(|(a, leaf)| f(leaf, other.leaf_at(&a)))
    }
}

impl<L: Clone> DecisionTree<L> {
    /// Build a tree from a row-major table over `keys` as given
    ///
    /// The last key varies fastest. `keys` need not be sorted.
    pub fn from_values(keys: &[DiscreteKey], values: &[L]) -> Result<Self, HybridError> {
        let canonical = canonical_discrete_keys(keys)?;
        if canonical.len() != keys.len() {
            return Err(HybridError::structure("repeated key in table declaration"));
        }
        let expected = num_assignments(keys);
        if values.len() != expected {
            return Err(HybridError::structure(format!(
                "table has {} values, keys need {}",
                values.len(),
                expected
            )));
        }
        Self::from_fn(keys, |a| {
            let idx = keys.iter().fold(0, |acc, dk| {
                acc * dk.cardinality + a.get(dk.key).unwrap_or(0)
            });
            values[idx].clone()
        })
    }

    /// Eliminate `key` by folding its branches with `f`
    ///
    /// A tree that does not declare `key` is returned unchanged.
    pub fn reduce_key<F>(&self, key: Key, f: F) -> Result<DecisionTree<L>, HybridError>
    where
        F: Fn(&L, &L) -> L,
    {
        let Some(dk) = self.keys.iter().find(|dk| dk.key == key).copied() else {
            return Ok(self.clone());
        };
        let mut acc = self.restrict(&Assignment::new().with(key, 0))?;
        for v in 1..dk.cardinality {
            let next = self.restrict(&Assignment::new().with(key, v))?;
            acc = acc.combine(&next, &f)?;
        }
        Ok(acc)
    }
}

impl<L: PartialEq> PartialEq for DecisionTree<L> {
    fn eq(&self, other: &Self) -> bool {
        self.equals_with(other, |a, b| a == b)
    }
}

fn build_node<L, E, F>(
    keys: &[DiscreteKey],
    depth: usize,
    assignment: &mut Assignment,
    f: &mut F,
) -> Result<Arc<Node<L>>, E>
where
    F: FnMut(&Assignment) -> Result<L, E>,
{
    if depth == keys.len() {
        return Ok(Arc::new(Node::Leaf(f(assignment)?)));
    }
    let dk = keys[depth];
    let mut branches = Vec::with_capacity(dk.cardinality);
    for v in 0..dk.cardinality {
        assignment.insert(dk.key, v);
        branches.push(build_node(keys, depth + 1, assignment, f)?);
    }
    Ok(Arc::new(Node::Choice {
        key: dk.key,
        branches,
    }))
}

fn apply_node<L, M, E, F>(
    node: &Arc<Node<L>>,
    f: &F,
    memo: &mut HashMap<usize, Arc<Node<M>>>,
) -> Result<Arc<Node<M>>, E>
where
    F: Fn(&L) -> Result<M, E>,
{
    let id = Node::id(node);
    if let Some(hit) = memo.get(&id) {
        return Ok(Arc::clone(hit));
    }
    let out = match node.as_ref() {
        Node::Leaf(value) => Arc::new(Node::Leaf(f(value)?)),
        Node::Choice { key, branches } => {
            let mut mapped = Vec::with_capacity(branches.len());
            for b in branches {
                mapped.push(apply_node(b, f, memo)?);
            }
            Arc::new(Node::Choice {
                key: *key,
                branches: mapped,
            })
        }
    };
    memo.insert(id, Arc::clone(&out));
    Ok(out)
}

fn combine_node<L, R, M, F>(
    a: &Arc<Node<L>>,
    b: &Arc<Node<R>>,
    f: &F,
    memo: &mut HashMap<(usize, usize), Arc<Node<M>>>,
) -> Arc<Node<M>>
where
    F: Fn(&L, &R) -> M,
{
    let id = (Node::id(a), Node::id(b));
    if let Some(hit) = memo.get(&id) {
        return Arc::clone(hit);
    }
    let (key, cardinality) = match (a.as_ref(), b.as_ref()) {
        (Node::Leaf(x), Node::Leaf(y)) => {
            let leaf = Arc::new(Node::Leaf(f(x, y)));
            memo.insert(id, Arc::clone(&leaf));
            return leaf;
        }
        (
            Node::Choice {
                key: ka,
                branches: ba,
            },
            Node::Choice {
                key: kb,
                branches: bb,
            },
        ) => {
            if ka <= kb {
                (*ka, ba.len())
            } else {
                (*kb, bb.len())
            }
        }
        (Node::Choice { key, branches }, Node::Leaf(_)) => (*key, branches.len()),
        (Node::Leaf(_), Node::Choice { key, branches }) => (*key, branches.len()),
    };

    let branches: Vec<Arc<Node<M>>> = (0..cardinality)
        .map(|v| {
            combine_node(
                Node::descend(a, key, v),
                Node::descend(b, key, v),
                f,
                memo,
            )
        })
        .collect();

    let out = match branches.first() {
        Some(first) if branches.iter().all(|b| Arc::ptr_eq(first, b)) => Arc::clone(first),
        _ => Arc::new(Node::Choice { key, branches }),
    };
    memo.insert(id, Arc::clone(&out));
    out
}

fn restrict_node<L>(
    node: &Arc<Node<L>>,
    assignment: &Assignment,
    memo: &mut HashMap<usize, Arc<Node<L>>>,
) -> Result<Arc<Node<L>>, HybridError> {
    let id = Node::id(node);
    if let Some(hit) = memo.get(&id) {
        return Ok(Arc::clone(hit));
    }
    let out = match node.as_ref() {
        Node::Leaf(_) => Arc::clone(node),
        Node::Choice { key, branches } => match assignment.get(*key) {
            Some(v) => {
                let child = branches.get(v).ok_or_else(|| {
                    HybridError::structure(format!("value {} out of range for {}", v, key))
                })?;
                restrict_node(child, assignment, memo)?
            }
            None => {
                let mut kept = Vec::with_capacity(branches.len());
                for b in branches {
                    kept.push(restrict_node(b, assignment, memo)?);
                }
                if kept.iter().zip(branches.iter()).all(|(n, o)| Arc::ptr_eq(n, o)) {
                    Arc::clone(node)
                } else {
                    Arc::new(Node::Choice {
                        key: *key,
                        branches: kept,
                    })
                }
            }
        },
    };
    memo.insert(id, Arc::clone(&out));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::key::shorthand::m;

    fn binary(i: u64) -> DiscreteKey {
        DiscreteKey::new(m(i), 2)
    }

    #[test]
    fn test_from_values_row_major() {
        let tree = DecisionTree::from_values(&[binary(1), binary(2)], &[1, 2, 3, 4]).unwrap();
        let at = |a, b| *tree.get(&Assignment::new().with(m(1), a).with(m(2), b)).unwrap();
        assert_eq!(at(0, 0), 1);
        assert_eq!(at(0, 1), 2);
        assert_eq!(at(1, 0), 3);
        assert_eq!(at(1, 1), 4);
    }

    #[test]
    fn test_from_values_unsorted_keys() {
        // table declared over (m2, m1): m1 varies fastest
        let tree = DecisionTree::from_values(&[binary(2), binary(1)], &[1, 2, 3, 4]).unwrap();
        assert_eq!(tree.keys()[0].key, m(1));
        let a = Assignment::new().with(m(1), 1).with(m(2), 0);
        assert_eq!(*tree.get(&a).unwrap(), 2);
    }

    #[test]
    fn test_from_values_rejects_bad_length() {
        let err = DecisionTree::from_values(&[binary(1)], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Structural);
    }

    #[test]
    fn test_get_missing_key() {
        let tree = DecisionTree::from_values(&[binary(1)], &[0.1, 0.9]).unwrap();
        let err = tree.get(&Assignment::new()).unwrap_err();
        assert_eq!(err, HybridError::MissingKey { key: m(1) });
    }

    #[test]
    fn test_apply_preserves_sharing() {
        let inner = DecisionTree::from_values(&[binary(2)], &[1, 2]).unwrap();
        let tree = DecisionTree::choice(binary(1), vec![inner.clone(), inner]).unwrap();
        assert_eq!(tree.keys().len(), 2);
        assert_eq!(tree.num_assignments(), 4);
        assert_eq!(tree.num_leaves(), 2);

        let doubled = tree.apply(|v| v * 2);
        assert_eq!(doubled.num_leaves(), 2);
        let a = Assignment::new().with(m(1), 1).with(m(2), 1);
        assert_eq!(*doubled.get(&a).unwrap(), 4);
    }

    #[test]
    fn test_choice_rejects_bad_children() {
        let leaf = DecisionTree::leaf(0.5);
        let err = DecisionTree::choice(binary(1), vec![leaf.clone()]).unwrap_err();
        assert!(matches!(err, HybridError::CardinalityMismatch { .. }));

        let earlier = DecisionTree::from_values(&[binary(1)], &[0.0, 1.0]).unwrap();
        let err = DecisionTree::choice(binary(2), vec![earlier.clone(), earlier]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Structural);
    }

    #[test]
    fn test_choice_rejects_zero_cardinality() {
        let err = DecisionTree::<f64>::choice(DiscreteKey::new(m(1), 0), vec![]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Structural);
    }

    #[test]
    fn test_combine_union_of_keys() {
        let a = DecisionTree::from_values(&[binary(1)], &[1.0, 2.0]).unwrap();
        let b = DecisionTree::from_values(&[binary(2)], &[10.0, 20.0]).unwrap();
        let c = a.combine(&b, |x, y| x * y).unwrap();
        assert_eq!(c.keys().len(), 2);
        for (assignment, value) in c.iter() {
            let expected = [1.0, 2.0][assignment.get(m(1)).unwrap()]
                * [10.0, 20.0][assignment.get(m(2)).unwrap()];
            assert_eq!(*value, expected);
        }
        // commutative up to the leaf function
        let d = b.combine(&a, |x, y| x * y).unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn test_combine_cardinality_mismatch() {
        let a = DecisionTree::from_values(&[binary(1)], &[1.0, 2.0]).unwrap();
        let b = DecisionTree::from_values(&[DiscreteKey::new(m(1), 3)], &[1.0, 2.0, 3.0]).unwrap();
        let err = a.combine(&b, |x, y| x + y).unwrap_err();
        assert!(matches!(err, HybridError::CardinalityMismatch { .. }));
    }

    #[test]
    fn test_restrict_and_reduce() {
        let tree = DecisionTree::from_values(&[binary(1), binary(2)], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let r = tree.restrict(&Assignment::new().with(m(1), 1)).unwrap();
        assert_eq!(r.keys(), &[binary(2)]);
        assert_eq!(*r.get(&Assignment::new().with(m(2), 0)).unwrap(), 3.0);

        let summed = tree.reduce_key(m(1), |a, b| a + b).unwrap();
        assert_eq!(summed.keys(), &[binary(2)]);
        assert_eq!(*summed.get(&Assignment::new().with(m(2), 0)).unwrap(), 4.0);
        assert_eq!(*summed.get(&Assignment::new().with(m(2), 1)).unwrap(), 6.0);
    }

    #[test]
    fn test_equality_ignores_sharing() {
        let expanded = DecisionTree::from_values(&[binary(1)], &[3, 3]).unwrap();
        let shared = DecisionTree::leaf(3);
        let collapsed = DecisionTree::choice(binary(1), vec![shared.clone(), shared]).unwrap();
        assert_eq!(expanded.num_leaves(), 2);
        assert_eq!(collapsed.num_leaves(), 1);
        assert_eq!(expanded, collapsed);
    }

    #[test]
    fn test_apply_with_assignment() {
        let tree = DecisionTree::from_values(&[binary(1)], &[0, 0]).unwrap();
        let labelled = tree.apply_with_assignment(|a, v| a.get(m(1)).unwrap() + v);
        assert_eq!(*labelled.get(&Assignment::new().with(m(1), 1)).unwrap(), 1);
    }
}
