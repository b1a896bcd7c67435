//! Multifrontal elimination against sequential elimination

use rand::rngs::StdRng;
use rand::SeedableRng;

use hybrid_inference::discrete::shorthand::{m, x};
use hybrid_inference::discrete::Assignment;
use hybrid_inference::fixtures::SwitchingChain;
use hybrid_inference::{EliminationConfig, Ordering};

use crate::helpers::assertions::{assert_discrete_close, assert_values_close};
use crate::helpers::scenarios::random_chain;

#[test]
fn test_hybrid_ordering_tree_matches_net() {
    let chain = SwitchingChain::new(5).unwrap();
    let graph = chain.linearized();
    let ordering = Ordering::hybrid(graph);
    // every continuous key precedes every discrete key
    let first_mode = ordering.iter().position(|k| k.tag() == Some('m')).unwrap();
    assert!(ordering.iter().skip(first_mode).all(|k| k.tag() == Some('m')));

    let config = EliminationConfig::default();
    let tree = graph.eliminate_multifrontal(&ordering, &config).unwrap();
    let net = graph.eliminate_sequential(&ordering, &config).unwrap();
    tree.check_running_intersection().unwrap();
    assert_eq!(tree.frontal_keys(), net.frontal_keys());

    for key in chain.m_keys() {
        assert_discrete_close(
            &tree.marginal_factor(key).unwrap(),
            &net.marginal_factor(key).unwrap(),
            1e-9,
            &format!("marginal {}", key),
        );
    }
    let assignment: Assignment = chain.m_keys().into_iter().map(|k| (k, k.index() as usize % 2)).collect();
    assert_values_close(
        &tree.optimize(&assignment).unwrap(),
        &net.optimize(&assignment).unwrap(),
        1e-9,
        "delta",
    );
}

#[test]
fn test_every_key_in_exactly_one_clique() {
    let chain = SwitchingChain::new(4).unwrap();
    let ordering = Ordering::new(chain.x_keys().into_iter().chain(chain.m_keys())).unwrap();
    let tree = chain
        .linearized()
        .eliminate_multifrontal(&ordering, &EliminationConfig::default())
        .unwrap();
    for key in ordering.iter() {
        let owners = tree
            .cliques()
            .iter()
            .filter(|c| c.frontals().contains(&key))
            .count();
        assert_eq!(owners, 1, "{} owned by {} cliques", key, owners);
    }
    // parents come after their children
    for (i, clique) in tree.cliques().iter().enumerate() {
        if let Some(parent) = clique.parent {
            assert!(parent > i);
            assert!(tree.children(parent).contains(&i));
        }
    }
    assert_eq!(tree.clique_containing(m(1)).unwrap(), tree.len() - 1);
    assert!(tree.clique_containing(x(9)).is_err());
}

#[test]
fn test_random_partial_trees_match_nets() {
    let config = EliminationConfig::default();
    for seed in 0..4 {
        let mut rng = StdRng::seed_from_u64(seed);
        let chain = random_chain(&mut rng, 5);
        let graph = chain.full_graph();
        let (tree, tree_remaining) = graph
            .eliminate_partial_multifrontal(&chain.x_ordering(), &config)
            .unwrap();
        let (net, net_remaining) = graph
            .eliminate_partial_sequential(&chain.x_ordering(), &config)
            .unwrap();
        tree.check_running_intersection().unwrap();

        let tree_factors = tree_remaining.discrete_factors();
        let net_factors = net_remaining.discrete_factors();
        for &key in &chain.m_keys {
            assert_discrete_close(
                &hybrid_inference::discrete::discrete_marginal(&tree_factors, key).unwrap(),
                &hybrid_inference::discrete::discrete_marginal(&net_factors, key).unwrap(),
                1e-9,
                &format!("seed {} marginal {}", seed, key),
            );
        }
        let assignment: Assignment = chain.m_keys.iter().map(|&k| (k, 1)).collect();
        assert_values_close(
            &tree.optimize(&assignment).unwrap(),
            &net.optimize(&assignment).unwrap(),
            1e-9,
            &format!("seed {} delta", seed),
        );
    }
}
