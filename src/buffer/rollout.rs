//! Rollout buffer for storing and processing trajectories
//!
//! This module implements experience storage for MAPPO training, including:
//! - Trajectory storage (observations, global states, actions, rewards, ...)
//! - GAE (Generalized Advantage Estimation) computation
//! - Minibatch sampling over the flattened batch
//!
//! # Buffer Layout
//!
//! Every array is a flat arena in `[num_steps, num_slots, dim]` row-major
//! order, so the flattened batch index of `(step, slot)` is
//! `step * num_slots + slot`. The arena is allocated once and overwritten
//! every iteration.

mod gae;
mod sampling;
mod storage;

#[cfg(test)]
mod tests;

pub use gae::compute_gae;
pub use sampling::{TensorBatch, generate_minibatch_indices};
pub use storage::RolloutBuffer;
