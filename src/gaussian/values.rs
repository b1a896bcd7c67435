//! Continuous value container

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::DVector;

use crate::discrete::Key;
use crate::errors::HybridError;

/// Map from continuous keys to vectors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorValues(BTreeMap<Key, DVector<f64>>);

impl VectorValues {
    /// Empty container
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: Key, value: DVector<f64>) -> Self {
        self.0.insert(key, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: Key, value: DVector<f64>) -> Option<DVector<f64>> {
        self.0.insert(key, value)
    }

    /// Value of `key`, if present
    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.0.get(&key)
    }

    /// Value of `key`, or [`HybridError::MissingKey`]
    pub fn at(&self, key: Key) -> Result<&DVector<f64>, HybridError> {
        self.0.get(&key).ok_or(HybridError::MissingKey { key })
    }

    /// Whether `key` has a value
    pub fn contains(&self, key: Key) -> bool {
        self.0.contains_key(&key)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (Key, &DVector<f64>)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// Stored keys in order
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.0.keys().copied()
    }

    /// Copy every entry of `other` into `self`, replacing duplicates
    pub fn extend(&mut self, other: VectorValues) {
        self.0.extend(other.0);
    }

    /// Entrywise sum over the union of keys
    pub fn add(&self, other: &VectorValues) -> Result<VectorValues, HybridError> {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            match out.0.get_mut(&k) {
                Some(existing) => {
                    if existing.len() != v.len() {
                        return Err(HybridError::DimensionMismatch {
                            key: k,
                            expected: existing.len(),
                            actual: v.len(),
                        });
                    }
                    *existing += v;
                }
                None => {
                    out.0.insert(k, v.clone());
                }
            }
        }
        Ok(out)
    }

    /// Compare entrywise with an absolute tolerance; key sets must match
    pub fn equals(&self, other: &VectorValues, tol: f64) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| {
                other.get(k).is_some_and(|w| {
                    v.len() == w.len() && v.iter().zip(w.iter()).all(|(a, b)| (a - b).abs() <= tol)
                })
            })
    }
}

impl fmt::Display for VectorValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.iter() {
            write!(f, "{}: [", k)?;
            for (i, x) in v.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:.6}", x)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

impl FromIterator<(Key, DVector<f64>)> for VectorValues {
    fn from_iter<T: IntoIterator<Item = (Key, DVector<f64>)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::shorthand::x;

    #[test]
    fn test_add_and_lookup() {
        let a = VectorValues::new().with(x(1), DVector::from_vec(vec![1.0]));
        let b = VectorValues::new()
            .with(x(1), DVector::from_vec(vec![2.0]))
            .with(x(2), DVector::from_vec(vec![5.0]));
        let c = a.add(&b).unwrap();
        assert_eq!(c.at(x(1)).unwrap()[0], 3.0);
        assert_eq!(c.at(x(2)).unwrap()[0], 5.0);
        assert_eq!(c.at(x(3)).unwrap_err(), HybridError::MissingKey { key: x(3) });

        let bad = VectorValues::new().with(x(1), DVector::from_vec(vec![1.0, 2.0]));
        assert!(matches!(
            a.add(&bad).unwrap_err(),
            HybridError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_equals_tolerance() {
        let a = VectorValues::new().with(x(1), DVector::from_vec(vec![1.0]));
        let b = VectorValues::new().with(x(1), DVector::from_vec(vec![1.0 + 1e-12]));
        assert!(a.equals(&b, 1e-9));
        assert!(!a.equals(&VectorValues::new(), 1e-9));
    }
}
