//! Incremental vs batch elimination on the three-state switching chain
//!
//! Step 1 adds the x1/x2 factors with P(m1) and eliminates x1, x2. Step 2 adds
//! the x3 factors with P(m2 | m1) and eliminates x2, x3, re-eliminating x2.
//! Expected weights were computed independently with a Givens QR.

use hybrid_inference::discrete::shorthand::{m, x};
use hybrid_inference::discrete::{discrete_marginal, Assignment};
use hybrid_inference::fixtures::SwitchingChain;
use hybrid_inference::{
    DiscreteWeighting, EliminationConfig, HybridBayesNet, HybridFactor, HybridFactorGraph, IncrementalHybrid, Ordering,
};

use crate::helpers::assertions::{
    assert_discrete_close, assert_net_close, assert_normalized, assert_scalar_close, assert_values_close,
};

const TOLERANCE: f64 = 1e-5;

fn run_incremental(chain: &SwitchingChain, config: EliminationConfig) -> IncrementalHybrid {
    let mut controller = IncrementalHybrid::new(config);
    for step in 1..=chain.num_steps() {
        let (factors, ordering) = chain.incremental_step(step).unwrap();
        controller.update(&factors, &ordering).unwrap();
    }
    controller
}

fn run_batch(chain: &SwitchingChain, config: &EliminationConfig) -> (HybridBayesNet, HybridFactorGraph) {
    let ordering = Ordering::new(chain.x_keys()).unwrap();
    chain
        .linearized()
        .eliminate_partial_sequential(&ordering, config)
        .unwrap()
}

fn assignment(m1: usize, m2: usize) -> Assignment {
    Assignment::new().with(m(1), m1).with(m(2), m2)
}

#[test]
fn test_first_step_weight() {
    let chain = SwitchingChain::new(3).unwrap();
    let (factors, ordering) = chain.incremental_step(1).unwrap();
    let mut controller = IncrementalHybrid::new(EliminationConfig::default());
    controller.update(&factors, &ordering).unwrap();

    let net = controller.bayes_net();
    assert_eq!(net.len(), 2);
    let x2 = net.at(1).unwrap().as_mixture().unwrap();
    assert!(x2.continuous_parents().is_empty());

    // the x1 weight is exactly one and was dropped: P(m1) then the x2 weight
    let remaining = controller.remaining_graph();
    assert_eq!(remaining.len(), 2);
    let HybridFactor::Discrete(weight) = remaining.get(1).unwrap() else {
        panic!("expected the x2 weight last");
    };
    let still = Assignment::new().with(m(1), 0);
    let moving = Assignment::new().with(m(1), 1);
    assert_scalar_close(weight.evaluate(&still).unwrap(), 0.611029012, TOLERANCE, "w(m1=0)");
    assert_scalar_close(weight.evaluate(&moving).unwrap(), 1.0, TOLERANCE, "w(m1=1)");
}

#[test]
fn test_second_step_weight() {
    let chain = SwitchingChain::new(3).unwrap();
    let controller = run_incremental(&chain, EliminationConfig::default());

    let net = controller.bayes_net();
    assert_eq!(net.len(), 3);
    for (i, key) in [x(1), x(2), x(3)].into_iter().enumerate() {
        assert!(net.at(i).unwrap().is_frontal(key));
        assert!(net.at(i).unwrap().is_hybrid());
    }

    let remaining = controller.remaining_graph();
    assert!(remaining.iter().all(|f| f.is_discrete()));
    let HybridFactor::Discrete(weight) = remaining.get(remaining.len() - 1).unwrap() else {
        panic!("expected the x3 weight last");
    };
    let expected = [
        ((0, 0), 0.606560389),
        ((0, 1), 0.999952415),
        ((1, 0), 0.612477280),
        ((1, 1), 1.0),
    ];
    for ((m1, m2), value) in expected {
        assert_scalar_close(
            weight.evaluate(&assignment(m1, m2)).unwrap(),
            value,
            TOLERANCE,
            &format!("w(m1={}, m2={})", m1, m2),
        );
    }
}

#[test]
fn test_conditionals_match_batch() {
    let chain = SwitchingChain::new(3).unwrap();
    let config = EliminationConfig::default();
    let controller = run_incremental(&chain, config.clone());
    let (batch, _) = run_batch(&chain, &config);
    assert_net_close(controller.bayes_net(), &batch, TOLERANCE, "incremental net");
}

#[test]
fn test_marginals_match_batch() {
    let chain = SwitchingChain::new(3).unwrap();
    let config = EliminationConfig::default();
    let controller = run_incremental(&chain, config.clone());
    let (_, remaining) = run_batch(&chain, &config);
    let batch_factors = remaining.discrete_factors();

    for (key, expected) in [(m(1), [0.408880905, 0.591119095]), (m(2), [0.378190748, 0.621809252])] {
        let incremental = controller.marginal_factor(key).unwrap();
        assert_normalized(&incremental, 1e-6, "incremental marginal");
        assert_discrete_close(
            &incremental,
            &discrete_marginal(&batch_factors, key).unwrap(),
            TOLERANCE,
            &format!("marginal {}", key),
        );
        for (value, p) in expected.into_iter().enumerate() {
            let a = Assignment::new().with(key, value);
            assert_scalar_close(incremental.evaluate(&a).unwrap(), p, TOLERANCE, &format!("P({}={})", key, value));
        }
    }
}

#[test]
fn test_marginal_likelihood_weighting_matches_batch() {
    let chain = SwitchingChain::new(4).unwrap();
    let config = EliminationConfig::builder()
        .weighting(DiscreteWeighting::MarginalLikelihood)
        .build();
    let controller = run_incremental(&chain, config.clone());
    let (batch_net, remaining) = run_batch(&chain, &config);
    assert_net_close(controller.bayes_net(), &batch_net, TOLERANCE, "incremental net");

    let batch_factors = remaining.discrete_factors();
    for key in chain.m_keys() {
        assert_discrete_close(
            &controller.marginal_factor(key).unwrap(),
            &discrete_marginal(&batch_factors, key).unwrap(),
            TOLERANCE,
            &format!("marginal {}", key),
        );
    }
}

#[test]
fn test_optimize_matches_batch() {
    let chain = SwitchingChain::new(5).unwrap();
    let config = EliminationConfig::default();
    let controller = run_incremental(&chain, config.clone());
    let (batch, _) = run_batch(&chain, &config);

    let all_moving: Assignment = chain.m_keys().into_iter().map(|k| (k, 1)).collect();
    let incremental = controller.optimize_at(&all_moving).unwrap();
    assert_values_close(&incremental, &batch.optimize(&all_moving).unwrap(), TOLERANCE, "delta");
    // measurements and unit motion agree: every state moves back by one
    for key in chain.x_keys() {
        assert_scalar_close(incremental.at(key).unwrap()[0], -1.0, TOLERANCE, "delta");
    }
}
