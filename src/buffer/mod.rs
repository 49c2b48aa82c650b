//! Experience buffers
//!
//! On-policy storage for the rollout collected each iteration, plus the
//! advantage estimation and minibatch sampling that operate on it.

pub mod rollout;

pub use rollout::{RolloutBuffer, TensorBatch, compute_gae, generate_minibatch_indices};
