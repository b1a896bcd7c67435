//! Switching linear dynamical system scenario
//!
//! A scalar state `x_k` moves along a line. Between consecutive states a
//! binary mode `m_k` selects still (`x_{k+1} - x_k = 0`) or moving
//! (`x_{k+1} - x_k = 1`) motion. Every state has a direct measurement
//! `z_k = k - 1`, `x_1` has a prior at 0, and the modes follow a uniform
//! prior on `m_1` with transitions `P(m_{k+1} | m_k) = "1/2 3/2"`.
//!
//! Everything is linearized at `x_k = k`, so the factors are in delta form and
//! the measurements agree with moving motion.
//!
//! Used by the unit tests, the integration tests and the benchmarks.

use std::sync::Arc;

use nalgebra::DVector;

use crate::discrete::shorthand::{m, x};
use crate::discrete::{DiscreteConditional, DiscreteKey, Key};
use crate::errors::HybridError;
use crate::gaussian::{linearize, linearize_mixture, Between, Measurement, NoiseModel, Prior, VectorValues};
use crate::hybrid::{HybridFactor, HybridFactorGraph, MixtureFactor, Ordering};

/// Standard deviation of the prior and the measurements
pub const MEASUREMENT_SIGMA: f64 = 0.1;

/// Standard deviation of the motion model
pub const MOTION_SIGMA: f64 = 1.0;

/// Ratio rows of the mode transition `P(m_{k+1} | m_k)`
pub const TRANSITION_SPEC: &str = "1/2 3/2";

/// Linearized switching chain over `k` states
#[derive(Debug, Clone)]
pub struct SwitchingChain {
    k: usize,
    linearization_point: VectorValues,
    gaussian: Vec<Arc<HybridFactor>>,
    mixtures: Vec<Arc<HybridFactor>>,
    discrete: Vec<Arc<HybridFactor>>,
    graph: HybridFactorGraph,
}

impl SwitchingChain {
    /// Build the chain
    ///
    /// # Errors
    /// Structural error if `k < 2`
    pub fn new(k: usize) -> Result<Self, HybridError> {
        if k < 2 {
            return Err(HybridError::structure(format!(
                "a switching chain needs at least two states, got {}",
                k
            )));
        }
        let n = k as u64;
        let linearization_point: VectorValues = (1..=n).map(|i| (x(i), DVector::from_element(1, i as f64))).collect();
        let measurement_noise = NoiseModel::isotropic(1, MEASUREMENT_SIGMA)?;
        let motion_noise = NoiseModel::isotropic(1, MOTION_SIGMA)?;

        let mut gaussian = Vec::with_capacity(k + 1);
        let prior = Prior::new(x(1), DVector::zeros(1), measurement_noise.clone())?;
        gaussian.push(linearize(&prior, &linearization_point)?);
        for i in 1..=n {
            let measurement = Prior::new(x(i), DVector::from_element(1, (i - 1) as f64), measurement_noise.clone())?;
            gaussian.push(linearize(&measurement, &linearization_point)?);
        }

        let mut mixtures = Vec::with_capacity(k - 1);
        for i in 1..n {
            let still = Between::new(x(i), x(i + 1), DVector::zeros(1), motion_noise.clone())?;
            let moving = Between::new(x(i), x(i + 1), DVector::from_element(1, 1.0), motion_noise.clone())?;
            let components: [&dyn Measurement; 2] = [&still, &moving];
            let tree = linearize_mixture(&[mode(i)], &components, &linearization_point)?;
            mixtures.push(MixtureFactor::new(tree)?);
        }

        let mut discrete = Vec::with_capacity(k - 1);
        discrete.push(DiscreteConditional::from_spec(mode(1), &[], "1/1")?.to_factor());
        for i in 2..n {
            discrete.push(DiscreteConditional::from_spec(mode(i), &[mode(i - 1)], TRANSITION_SPEC)?.to_factor());
        }

        let gaussian: Vec<Arc<HybridFactor>> = gaussian.into_iter().map(|f| Arc::new(f.into())).collect();
        let mixtures: Vec<Arc<HybridFactor>> = mixtures.into_iter().map(|f| Arc::new(f.into())).collect();
        let discrete: Vec<Arc<HybridFactor>> = discrete.into_iter().map(|f| Arc::new(f.into())).collect();
        let graph = gaussian
            .iter()
            .chain(mixtures.iter())
            .chain(discrete.iter())
            .cloned()
            .collect();
        Ok(Self {
            k,
            linearization_point,
            gaussian,
            mixtures,
            discrete,
            graph,
        })
    }

    /// Number of states
    pub fn len(&self) -> usize {
        self.k
    }

    /// Always false; a chain has at least two states
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of incremental steps, one per mode
    pub fn num_steps(&self) -> usize {
        self.k - 1
    }

    /// Values the chain was linearized at
    pub fn linearization_point(&self) -> &VectorValues {
        &self.linearization_point
    }

    /// The whole linearized graph: prior, measurements, motion mixtures, then
    /// mode prior and transitions
    pub fn linearized(&self) -> &HybridFactorGraph {
        &self.graph
    }

    /// Prior on `x1` followed by the measurements of `x1..xk`
    pub fn gaussian_factors(&self) -> &[Arc<HybridFactor>] {
        &self.gaussian
    }

    /// Motion mixtures, the `i`-th between `x_{i+1}` and `x_{i+2}`
    pub fn mixture_factors(&self) -> &[Arc<HybridFactor>] {
        &self.mixtures
    }

    /// Mode prior followed by the mode transitions
    pub fn discrete_factors(&self) -> &[Arc<HybridFactor>] {
        &self.discrete
    }

    /// `x1..xk`
    pub fn x_keys(&self) -> Vec<Key> {
        (1..=self.k as u64).map(x).collect()
    }

    /// `m1..m_{k-1}`
    pub fn m_keys(&self) -> Vec<Key> {
        (1..self.k as u64).map(m).collect()
    }

    /// Binary mode keys
    pub fn mode_keys(&self) -> Vec<DiscreteKey> {
        (1..self.k as u64).map(mode).collect()
    }

    /// Factors and ordering of incremental step `step` (1-based)
    ///
    /// Step 1 brings `x1`, `x2` and `m1` and eliminates `x1, x2`. Step `t > 1`
    /// brings `x_{t+1}` and `m_t` and eliminates `x_t, x_{t+1}`, so `x_t` is
    /// re-eliminated together with the new motion factor.
    ///
    /// # Errors
    /// Structural error if `step` is 0 or beyond [`SwitchingChain::num_steps`]
    pub fn incremental_step(&self, step: usize) -> Result<(HybridFactorGraph, Ordering), HybridError> {
        if step == 0 || step > self.num_steps() {
            return Err(HybridError::structure(format!(
                "step {} outside 1..={}",
                step,
                self.num_steps()
            )));
        }
        let mut factors = HybridFactorGraph::new();
        if step == 1 {
            for factor in &self.gaussian[..3] {
                factors.push_shared(Arc::clone(factor));
            }
        } else {
            factors.push_shared(Arc::clone(&self.gaussian[step + 1]));
        }
        factors.push_shared(Arc::clone(&self.mixtures[step - 1]));
        factors.push_shared(Arc::clone(&self.discrete[step - 1]));
        let t = step as u64;
        let ordering = if step == 1 {
            Ordering::new([x(1), x(2)])?
        } else {
            Ordering::new([x(t), x(t + 1)])?
        };
        Ok((factors, ordering))
    }
}

/// Binary mode `m_i`
fn mode(i: u64) -> DiscreteKey {
    DiscreteKey::new(m(i), 2)
}
