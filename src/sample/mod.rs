//! Route-to-viewpoint sampling.

/// Adaptive-density sampler and turn annotation.
pub mod sampler;
