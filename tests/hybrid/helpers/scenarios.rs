//! Randomized switching chains
//!
//! Same structure as `fixtures::SwitchingChain`, with random measurements,
//! noise levels, motion hypotheses and mode transitions drawn from a seeded
//! generator.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::Rng;

use hybrid_inference::discrete::shorthand::{m, x};
use hybrid_inference::gaussian::{linearize, linearize_mixture, Between, Measurement, Prior};
use hybrid_inference::{
    DiscreteConditional, DiscreteKey, HybridFactor, HybridFactorGraph, Key, MixtureFactor, NoiseModel,
    Ordering, VectorValues,
};

/// A random chain split into incremental steps
pub struct RandomChain {
    /// States `x1..xk`
    pub x_keys: Vec<Key>,
    /// Modes `m1..m_{k-1}`
    pub m_keys: Vec<Key>,
    /// Factors and ordering of every incremental step
    pub steps: Vec<(HybridFactorGraph, Ordering)>,
}

impl RandomChain {
    /// Union of the factors of every step, in step order
    pub fn full_graph(&self) -> HybridFactorGraph {
        let mut graph = HybridFactorGraph::new();
        for (factors, _) in &self.steps {
            graph.extend(factors);
        }
        graph
    }

    /// Continuous keys in chain order
    pub fn x_ordering(&self) -> Ordering {
        Ordering::new(self.x_keys.iter().copied()).unwrap()
    }
}

fn binary(i: u64) -> DiscreteKey {
    DiscreteKey::new(m(i), 2)
}

/// Random chain over `k >= 2` states
pub fn random_chain(rng: &mut StdRng, k: u64) -> RandomChain {
    let point: VectorValues = (1..=k)
        .map(|i| (x(i), DVector::from_element(1, i as f64 + rng.gen_range(-0.2..0.2))))
        .collect();
    let measurement_noise = NoiseModel::isotropic(1, rng.gen_range(0.1..0.5)).unwrap();
    let motion_noise = NoiseModel::isotropic(1, rng.gen_range(0.5..1.5)).unwrap();

    let measurement = |rng: &mut StdRng, i: u64| -> HybridFactor {
        let z = (i - 1) as f64 + rng.gen_range(-0.3..0.3);
        let prior = Prior::new(x(i), DVector::from_element(1, z), measurement_noise.clone()).unwrap();
        linearize(&prior, &point).unwrap().into()
    };
    let mixture = |rng: &mut StdRng, i: u64| -> HybridFactor {
        let still = Between::new(x(i), x(i + 1), DVector::zeros(1), motion_noise.clone()).unwrap();
        let step = rng.gen_range(0.5..1.5);
        let moving = Between::new(x(i), x(i + 1), DVector::from_element(1, step), motion_noise.clone()).unwrap();
        let components: [&dyn Measurement; 2] = [&still, &moving];
        let tree = linearize_mixture(&[binary(i)], &components, &point).unwrap();
        MixtureFactor::new(tree).unwrap().into()
    };
    let transition = |rng: &mut StdRng, i: u64| -> HybridFactor {
        let spec = if i == 1 {
            format!("{:.3}/{:.3}", rng.gen_range(0.2..1.0), rng.gen_range(0.2..1.0))
        } else {
            format!(
                "{:.3}/{:.3} {:.3}/{:.3}",
                rng.gen_range(0.2..1.0),
                rng.gen_range(0.2..1.0),
                rng.gen_range(0.2..1.0),
                rng.gen_range(0.2..1.0)
            )
        };
        let parents: Vec<DiscreteKey> = if i == 1 { vec![] } else { vec![binary(i - 1)] };
        DiscreteConditional::from_spec(binary(i), &parents, &spec)
            .unwrap()
            .to_factor()
            .into()
    };

    let mut steps = Vec::new();
    let mut first = HybridFactorGraph::new();
    let prior = Prior::new(x(1), DVector::zeros(1), measurement_noise.clone()).unwrap();
    first.push(linearize(&prior, &point).unwrap());
    first.push(measurement(rng, 1));
    first.push(measurement(rng, 2));
    first.push(mixture(rng, 1));
    first.push(transition(rng, 1));
    steps.push((first, Ordering::new([x(1), x(2)]).unwrap()));
    for t in 2..k {
        let mut factors = HybridFactorGraph::new();
        factors.push(measurement(rng, t + 1));
        factors.push(mixture(rng, t));
        factors.push(transition(rng, t));
        steps.push((factors, Ordering::new([x(t), x(t + 1)]).unwrap()));
    }

    RandomChain {
        x_keys: (1..=k).map(x).collect(),
        m_keys: (1..k).map(m).collect(),
        steps,
    }
}
