//! Linear-Gaussian building blocks
//!
//! Noise models, value containers, whitened factors, square-root
//! conditionals, dense QR elimination and measurement linearization.

pub mod conditional;
pub mod elimination;
pub mod factor;
pub mod linearize;
pub mod noise;
pub mod values;

pub use conditional::GaussianConditional;
pub use elimination::{
    back_substitute, collect_dims, eliminate_gaussian, eliminate_gaussian_sequential,
    eliminate_gaussian_with_dims, GaussianElimination,
};
pub use factor::{DimVec, GaussianFactor, KeyVec};
pub use linearize::{
    linearize, linearize_mixture, Between, JacobianRequest, Measurement, MeasurementEval, Prior,
};
pub use noise::NoiseModel;
pub use values::VectorValues;
