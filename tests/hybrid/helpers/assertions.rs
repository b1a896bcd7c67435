//! Assertion functions for numerical comparisons with tolerance

use hybrid_inference::discrete::Assignment;
use hybrid_inference::{DiscreteFactor, HybridBayesNet, Key, VectorValues};

/// Compare scalar values with tolerance
pub fn assert_scalar_close(actual: f64, expected: f64, tolerance: f64, field_name: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "{}: expected {}, got {} (diff: {}, tolerance: {})",
        field_name,
        expected,
        actual,
        diff,
        tolerance
    );
}

/// Compare two discrete factors at every assignment of `actual`'s keys
pub fn assert_discrete_close(
    actual: &DiscreteFactor,
    expected: &DiscreteFactor,
    tolerance: f64,
    field_name: &str,
) {
    assert_eq!(
        actual.keys(),
        expected.keys(),
        "{}: key mismatch (actual: {}, expected: {})",
        field_name,
        actual,
        expected
    );
    for assignment in Assignment::enumerate(actual.keys()) {
        let a = actual.evaluate(&assignment).unwrap();
        let e = expected.evaluate(&assignment).unwrap();
        assert_scalar_close(a, e, tolerance, &format!("{} at {}", field_name, assignment));
    }
}

/// Compare two Bayes nets conditional by conditional
pub fn assert_net_close(actual: &HybridBayesNet, expected: &HybridBayesNet, tolerance: f64, field_name: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{}: conditional count mismatch (actual: {}, expected: {})",
        field_name,
        actual.len(),
        expected.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            a.equals(e, tolerance),
            "{}[{}]: expected {}, got {}",
            field_name,
            i,
            e,
            a
        );
    }
}

/// Compare two continuous estimates key by key
pub fn assert_values_close(actual: &VectorValues, expected: &VectorValues, tolerance: f64, field_name: &str) {
    let keys: Vec<Key> = expected.keys().collect();
    assert_eq!(
        actual.keys().collect::<Vec<_>>(),
        keys,
        "{}: key mismatch",
        field_name
    );
    for key in keys {
        let a = actual.at(key).unwrap();
        let e = expected.at(key).unwrap();
        for i in 0..e.len() {
            assert_scalar_close(a[i], e[i], tolerance, &format!("{}[{}][{}]", field_name, key, i));
        }
    }
}

/// Check that a factor sums to one over its keys
pub fn assert_normalized(factor: &DiscreteFactor, tolerance: f64, field_name: &str) {
    assert_scalar_close(factor.total(), 1.0, tolerance, &format!("{} total", field_name));
}
