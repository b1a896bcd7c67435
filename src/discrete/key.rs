//! Variable keys, discrete keys and assignments
//!
//! A [`Key`] identifies any variable. Keys built with [`symbol`] pack a
//! character and an index into one `u64` and print as `x1`, `m2`, ...
//! A [`DiscreteKey`] adds a cardinality, and an [`Assignment`] maps discrete
//! keys to concrete values.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::HybridError;

const CHAR_BITS: u32 = 56;
const INDEX_MASK: u64 = (1 << CHAR_BITS) - 1;

/// Opaque, totally ordered variable identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(pub u64);

impl Key {
    /// Key built from a character tag and an index
    pub fn symbol(tag: char, index: u64) -> Self {
        Key(((tag as u64) << CHAR_BITS) | (index & INDEX_MASK))
    }

    /// Character tag, if this key was built with [`Key::symbol`]
    pub fn tag(&self) -> Option<char> {
        let c = (self.0 >> CHAR_BITS) as u8;
        if c.is_ascii_alphabetic() {
            Some(c as char)
        } else {
            None
        }
    }

    /// Index part of a symbol key
    pub fn index(&self) -> u64 {
        self.0 & INDEX_MASK
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(c) => write!(f, "{}{}", c, self.index()),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Shorthand for [`Key::symbol`]
pub fn symbol(tag: char, index: u64) -> Key {
    Key::symbol(tag, index)
}

/// Single-letter constructors for the usual variable families
pub mod shorthand {
    use super::Key;

    /// Continuous state `x<i>`
    pub fn x(index: u64) -> Key {
        Key::symbol('x', index)
    }

    /// Discrete mode `m<i>`
    pub fn m(index: u64) -> Key {
        Key::symbol('m', index)
    }
}

/// Discrete variable: a key plus its number of admissible values
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiscreteKey {
    /// Variable identifier
    pub key: Key,
    /// Number of values, at least one
    pub cardinality: usize,
}

impl DiscreteKey {
    /// Create a discrete key
    pub fn new(key: Key, cardinality: usize) -> Self {
        Self { key, cardinality }
    }
}

impl fmt::Display for DiscreteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.key, self.cardinality)
    }
}

/// Short list of discrete keys
pub type DiscreteKeys = SmallVec<[DiscreteKey; 4]>;

/// Sort `keys` by key and reject repeated keys with conflicting cardinality.
///
/// Repeats with the same cardinality are collapsed.
pub fn canonical_discrete_keys(keys: &[DiscreteKey]) -> Result<DiscreteKeys, HybridError> {
    let mut sorted: DiscreteKeys = keys.iter().copied().collect();
    sorted.sort_by_key(|dk| dk.key);
    let mut out = DiscreteKeys::new();
    for dk in sorted {
        if dk.cardinality == 0 {
            return Err(HybridError::structure(format!(
                "discrete key {} has cardinality zero",
                dk.key
            )));
        }
        match out.last() {
            Some(prev) if prev.key == dk.key => {
                if prev.cardinality != dk.cardinality {
                    return Err(HybridError::CardinalityMismatch {
                        key: dk.key,
                        expected: prev.cardinality,
                        actual: dk.cardinality,
                    });
                }
            }
            _ => out.push(dk),
        }
    }
    Ok(out)
}

/// Sorted union of two key lists with cardinality checking
pub fn merge_discrete_keys(
    a: &[DiscreteKey],
    b: &[DiscreteKey],
) -> Result<DiscreteKeys, HybridError> {
    let mut all: DiscreteKeys = a.iter().copied().collect();
    all.extend(b.iter().copied());
    canonical_discrete_keys(&all)
}

/// Product of cardinalities
pub fn num_assignments(keys: &[DiscreteKey]) -> usize {
    keys.iter().map(|dk| dk.cardinality).product()
}

/// Concrete values for a set of discrete keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Assignment(BTreeMap<Key, usize>);

impl Assignment {
    /// Empty assignment
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: Key, value: usize) -> Self {
        self.0.insert(key, value);
        self
    }

    /// Set the value of `key`, returning the previous value
    pub fn insert(&mut self, key: Key, value: usize) -> Option<usize> {
        self.0.insert(key, value)
    }

    /// Value of `key`, if assigned
    pub fn get(&self, key: Key) -> Option<usize> {
        self.0.get(&key).copied()
    }

    /// Value of `key`, or [`HybridError::MissingKey`]
    pub fn require(&self, key: Key) -> Result<usize, HybridError> {
        self.get(key).ok_or(HybridError::MissingKey { key })
    }

    /// Whether `key` is assigned
    pub fn contains(&self, key: Key) -> bool {
        self.0.contains_key(&key)
    }

    /// Number of assigned keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is assigned
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (Key, usize)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Keep only the listed keys
    pub fn restrict(&self, keys: &[DiscreteKey]) -> Assignment {
        Assignment(
            keys.iter()
                .filter_map(|dk| self.get(dk.key).map(|v| (dk.key, v)))
                .collect(),
        )
    }

    /// Union of two assignments; `other` wins on conflicts
    pub fn merged(&self, other: &Assignment) -> Assignment {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.insert(k, v);
        }
        out
    }

    /// Enumerate every assignment of `keys`, last key varying fastest
    pub fn enumerate(keys: &[DiscreteKey]) -> AssignmentIter {
        AssignmentIter::new(keys)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(Key, usize)> for Assignment {
    fn from_iter<T: IntoIterator<Item = (Key, usize)>>(iter: T) -> Self {
        Assignment(iter.into_iter().collect())
    }
}

/// Row-major iterator over the cartesian product of discrete keys
#[derive(Debug, Clone)]
pub struct AssignmentIter {
    keys: DiscreteKeys,
    digits: Vec<usize>,
    done: bool,
}

impl AssignmentIter {
    fn new(keys: &[DiscreteKey]) -> Self {
        let done = keys.iter().any(|dk| dk.cardinality == 0);
        Self {
            keys: keys.iter().copied().collect(),
            digits: vec![0; keys.len()],
            done,
        }
    }
}

impl Iterator for AssignmentIter {
    type Item = Assignment;

    fn next(&mut self) -> Option<Assignment> {
        if self.done {
            return None;
        }
        let current = self
            .keys
            .iter()
            .zip(self.digits.iter())
            .map(|(dk, &v)| (dk.key, v))
            .collect();

        // odometer increment, last key fastest
        let mut pos = self.keys.len();
        loop {
            if pos == 0 {
                self.done = true;
                break;
            }
            pos -= 1;
            self.digits[pos] += 1;
            if self.digits[pos] < self.keys[pos].cardinality {
                break;
            }
            self.digits[pos] = 0;
        }
        Some(current)
    }
}
