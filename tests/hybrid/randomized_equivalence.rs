//! Incremental vs batch elimination on seeded random switching chains

use rand::rngs::StdRng;
use rand::SeedableRng;

use hybrid_inference::discrete::discrete_marginal;
use hybrid_inference::{DiscreteWeighting, EliminationConfig, IncrementalHybrid};

use crate::helpers::assertions::{assert_discrete_close, assert_net_close, assert_values_close};
use crate::helpers::scenarios::random_chain;

const TOLERANCE: f64 = 1e-6;

fn check_seed(seed: u64, k: u64, config: EliminationConfig) {
    let mut rng = StdRng::seed_from_u64(seed);
    let chain = random_chain(&mut rng, k);

    let mut controller = IncrementalHybrid::new(config.clone());
    for (factors, ordering) in &chain.steps {
        controller.update(factors, ordering).unwrap();
    }
    let (batch_net, remaining) = chain
        .full_graph()
        .eliminate_partial_sequential(&chain.x_ordering(), &config)
        .unwrap();

    let label = format!("seed {}", seed);
    assert_net_close(controller.bayes_net(), &batch_net, TOLERANCE, &label);

    let batch_factors = remaining.discrete_factors();
    for &key in &chain.m_keys {
        assert_discrete_close(
            &controller.marginal_factor(key).unwrap(),
            &discrete_marginal(&batch_factors, key).unwrap(),
            TOLERANCE,
            &format!("{} marginal {}", label, key),
        );
    }

    let incremental_map = controller.optimize().unwrap();
    let batch_map = batch_net.optimize_with(&remaining).unwrap();
    assert_eq!(incremental_map.discrete, batch_map.discrete, "{}: MPE mismatch", label);
    assert_values_close(
        &incremental_map.continuous,
        &batch_map.continuous,
        TOLERANCE,
        &format!("{} MAP", label),
    );
}

#[test]
fn test_random_chains_residual_weighting() {
    for seed in 0..8 {
        check_seed(seed, 4, EliminationConfig::default());
    }
}

#[test]
fn test_random_chains_marginal_likelihood() {
    let config = EliminationConfig::builder()
        .weighting(DiscreteWeighting::MarginalLikelihood)
        .build();
    for seed in 100..104 {
        check_seed(seed, 5, config.clone());
    }
}

#[test]
fn test_long_random_chain() {
    check_seed(42, 8, EliminationConfig::default());
}
