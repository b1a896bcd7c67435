//! Error reporting of elimination and incremental updates

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use hybrid_inference::discrete::shorthand::{m, x};
use hybrid_inference::fixtures::SwitchingChain;
use hybrid_inference::{
    DiscreteFactor, DiscreteKey, EliminationConfig, ErrorKind, GaussianFactor, HybridError, HybridFactorGraph,
    IncrementalHybrid, NoiseModel, Ordering,
};

fn unit_prior(key: hybrid_inference::Key, dim: usize) -> GaussianFactor {
    GaussianFactor::new(
        vec![(key, DMatrix::identity(dim, dim))],
        DVector::zeros(dim),
        &NoiseModel::unit(dim),
    )
    .unwrap()
}

#[test]
fn test_key_without_factors_is_underdetermined() {
    let chain = SwitchingChain::new(3).unwrap();
    let ordering = Ordering::new([x(1), x(9)]).unwrap();
    let err = chain
        .linearized()
        .eliminate_partial_sequential(&ordering, &EliminationConfig::default())
        .unwrap_err();
    assert_eq!(err, HybridError::Underdetermined { key: x(9) });
}

#[test]
fn test_duplicate_ordering_key() {
    let err = Ordering::new([x(1), x(2), x(1)]).unwrap_err();
    assert_eq!(err, HybridError::DuplicateKey { key: x(1) });
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_cardinality_mismatch() {
    let mut graph = HybridFactorGraph::new();
    graph.push(DiscreteFactor::new(&[DiscreteKey::new(m(1), 2)], &[0.5, 0.5]).unwrap());
    graph.push(DiscreteFactor::new(&[DiscreteKey::new(m(1), 3)], &[0.2, 0.3, 0.5]).unwrap());
    let ordering = Ordering::new([m(1)]).unwrap();
    let err = graph
        .eliminate_sequential(&ordering, &EliminationConfig::default())
        .unwrap_err();
    assert!(
        matches!(err, HybridError::CardinalityMismatch { key, .. } if key == m(1)),
        "unexpected error {:?}",
        err
    );
}

#[test]
fn test_dimension_mismatch() {
    let mut graph = HybridFactorGraph::new();
    graph.push(unit_prior(x(1), 1));
    graph.push(unit_prior(x(1), 2));
    let err = graph
        .eliminate_sequential(&Ordering::new([x(1)]).unwrap(), &EliminationConfig::default())
        .unwrap_err();
    assert!(matches!(err, HybridError::DimensionMismatch { key, .. } if key == x(1)));
}

#[test]
fn test_mode_before_state_is_structural() {
    let chain = SwitchingChain::new(3).unwrap();
    let ordering = Ordering::new([m(1), x(1), x(2), x(3), m(2)]).unwrap();
    let err = chain
        .linearized()
        .eliminate_sequential(&ordering, &EliminationConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_incomplete_full_ordering_is_structural() {
    let chain = SwitchingChain::new(3).unwrap();
    let ordering = Ordering::new(chain.x_keys()).unwrap();
    let err = chain
        .linearized()
        .eliminate_sequential(&ordering, &EliminationConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
    let err = chain
        .linearized()
        .eliminate_multifrontal(&ordering, &EliminationConfig::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn test_failed_update_is_atomic() {
    let chain = SwitchingChain::new(4).unwrap();
    let mut controller = IncrementalHybrid::new(EliminationConfig::default());
    for step in 1..=2 {
        let (factors, ordering) = chain.incremental_step(step).unwrap();
        controller.update(&factors, &ordering).unwrap();
    }
    let before = controller.state().clone();

    // x4 re-enters with a conflicting dimension
    let mut factors = HybridFactorGraph::new();
    factors.push_shared(Arc::clone(&chain.gaussian_factors()[4]));
    factors.push(unit_prior(x(4), 3));
    let err = controller
        .update(&factors, &Ordering::new([x(3), x(4)]).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);

    assert_eq!(controller.num_updates(), 2);
    assert_eq!(controller.bayes_net().len(), before.bayes_net().len());
    assert!(controller.bayes_net().equals(before.bayes_net(), 1e-12));
    assert_eq!(controller.remaining_graph().len(), before.remaining().len());

    // the controller still accepts the real step
    let (factors, ordering) = chain.incremental_step(3).unwrap();
    controller.update(&factors, &ordering).unwrap();
    assert_eq!(controller.bayes_net().len(), 4);
}

#[test]
fn test_queries_on_missing_keys() {
    let chain = SwitchingChain::new(3).unwrap();
    let (net, _) = chain
        .linearized()
        .eliminate_partial_sequential(&Ordering::new(chain.x_keys()).unwrap(), &EliminationConfig::default())
        .unwrap();
    assert_eq!(net.marginal_factor(m(1)).unwrap_err().kind(), ErrorKind::Lookup);
    let partial = hybrid_inference::Assignment::new().with(m(1), 0);
    assert_eq!(net.optimize(&partial).unwrap_err().kind(), ErrorKind::Lookup);
}
