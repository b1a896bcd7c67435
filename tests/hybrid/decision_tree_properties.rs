//! Property-based tests for decision trees and discrete factors

use proptest::prelude::*;

use hybrid_inference::discrete::shorthand::m;
use hybrid_inference::discrete::Assignment;
use hybrid_inference::{DecisionTree, DiscreteFactor, DiscreteKey};

fn k1() -> DiscreteKey {
    DiscreteKey::new(m(1), 2)
}

fn k2() -> DiscreteKey {
    DiscreteKey::new(m(2), 3)
}

fn k3() -> DiscreteKey {
    DiscreteKey::new(m(3), 2)
}

fn all_keys() -> Vec<DiscreteKey> {
    vec![k1(), k2(), k3()]
}

fn table(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.01f64..10.0, n)
}

/// Factors over {m1, m2}, {m2, m3} and {m3, m1}
fn factors_strategy() -> impl Strategy<Value = (DiscreteFactor, DiscreteFactor, DiscreteFactor)> {
    (table(6), table(6), table(4)).prop_map(|(a, b, c)| {
        (
            DiscreteFactor::new(&[k1(), k2()], &a).unwrap(),
            DiscreteFactor::new(&[k2(), k3()], &b).unwrap(),
            DiscreteFactor::new(&[k3(), k1()], &c).unwrap(),
        )
    })
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn product_is_commutative_and_associative((a, b, c) in factors_strategy()) {
        let ab = a.product(&b).unwrap();
        let ba = b.product(&a).unwrap();
        let ab_c = ab.product(&c).unwrap();
        let a_bc = a.product(&b.product(&c).unwrap()).unwrap();
        prop_assert_eq!(ab.keys(), ba.keys());
        prop_assert_eq!(ab_c.keys(), a_bc.keys());
        for assignment in Assignment::enumerate(&all_keys()) {
            let expected = a.evaluate(&assignment).unwrap()
                * b.evaluate(&assignment).unwrap()
                * c.evaluate(&assignment).unwrap();
            prop_assert!(close(ab.evaluate(&assignment).unwrap(), ba.evaluate(&assignment).unwrap()));
            prop_assert!(close(ab_c.evaluate(&assignment).unwrap(), expected));
            prop_assert!(close(a_bc.evaluate(&assignment).unwrap(), expected));
        }
    }

    #[test]
    fn normalized_sums_to_one((a, b, _) in factors_strategy()) {
        let joint = a.product(&b).unwrap().normalized().unwrap();
        prop_assert!(close(joint.total(), 1.0));
        for key in [m(1), m(2), m(3)] {
            let marginal = joint.marginalize_to(&[key]).unwrap();
            prop_assert_eq!(marginal.keys().len(), 1);
            prop_assert!(close(marginal.total(), 1.0));
        }
    }

    #[test]
    fn sum_out_order_does_not_matter((a, b, c) in factors_strategy()) {
        let joint = DiscreteFactor::product_all([&a, &b, &c]).unwrap();
        let first = joint.sum_out(m(1)).unwrap().sum_out(m(3)).unwrap();
        let second = joint.sum_out(m(3)).unwrap().sum_out(m(1)).unwrap();
        prop_assert!(first.equals(&second, 1e-9 * joint.total()));
        prop_assert!(close(first.total(), joint.total()));
    }

    #[test]
    fn restrict_agrees_with_get(values in table(12), v1 in 0usize..2, v2 in 0usize..3) {
        let tree = DecisionTree::from_values(&all_keys(), &values).unwrap();
        let fixed = Assignment::new().with(m(1), v1).with(m(2), v2);
        let restricted = tree.restrict(&fixed).unwrap();
        prop_assert_eq!(restricted.keys(), &[k3()][..]);
        for v3 in 0..2 {
            let full = fixed.clone().with(m(3), v3);
            let partial = Assignment::new().with(m(3), v3);
            prop_assert_eq!(restricted.get(&partial).unwrap(), tree.get(&full).unwrap());
            // row-major with the last key fastest
            prop_assert_eq!(*tree.get(&full).unwrap(), values[(v1 * 3 + v2) * 2 + v3]);
        }
    }

    #[test]
    fn apply_preserves_shape(values in table(6)) {
        let tree = DecisionTree::from_values(&[k1(), k2()], &values).unwrap();
        let doubled = tree.apply(|v| 2.0 * v);
        prop_assert_eq!(doubled.keys(), tree.keys());
        prop_assert!(doubled.num_leaves() <= tree.num_assignments());
        for (assignment, leaf) in tree.iter() {
            prop_assert!(close(*doubled.get(&assignment).unwrap(), 2.0 * leaf));
        }
    }
}

#[test]
fn test_constant_leaves_collapse() {
    let tree = DecisionTree::from_values(&[k1(), k2()], &[1.0; 6]).unwrap();
    let other = DecisionTree::from_values(&[k2(), k3()], &[2.0; 6]).unwrap();
    let combined = tree.combine(&other, |a, b| a * b).unwrap();
    assert_eq!(combined.keys(), &all_keys()[..]);
    assert_eq!(combined.num_assignments(), 12);
    assert!(combined.leaves().iter().all(|v| **v == 2.0));
}
