//! Data sampling and batching for rollout buffers
//!
//! This module provides utilities for creating training minibatches from a
//! flattened rollout, including index shuffling and tensor gathering.

use rand::{Rng, seq::SliceRandom};
use tch::Tensor;

/// Generate minibatch indices for PPO training
///
/// Shuffles `0..buffer_size` and splits it into chunks of `minibatch_size`.
/// The last chunk is shorter when the sizes do not divide evenly, so every
/// index appears exactly once.
///
/// # Arguments
/// * `buffer_size` - Total number of samples in the batch
/// * `minibatch_size` - Desired size of each minibatch
/// * `rng` - Source of the permutation
pub fn generate_minibatch_indices<R: Rng + ?Sized>(
    buffer_size: usize,
    minibatch_size: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..buffer_size).collect();
    indices.shuffle(rng);

    indices.chunks(minibatch_size.max(1)).map(|chunk| chunk.to_vec()).collect()
}

/// Flattened rollout as training tensors
///
/// Row `i` of every tensor belongs to the same transition.
#[derive(Debug)]
pub struct TensorBatch {
    /// Observations [batch_size, obs_dim]
    pub observations: Tensor,

    /// Global states [batch_size, state_dim]
    pub states: Tensor,

    /// Actions [batch_size] (Int64)
    pub actions: Tensor,

    /// Log probabilities under the rollout policy [batch_size]
    pub log_probs: Tensor,

    /// Raw value estimates from the rollout [batch_size]
    pub values: Tensor,

    /// Advantages [batch_size]
    pub advantages: Tensor,

    /// Raw returns [batch_size]
    pub returns: Tensor,
}

impl TensorBatch {
    /// Gather the rows listed in `indices`
    pub fn select(&self, indices: &[usize]) -> TensorBatch {
        let indices: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
        let indices = Tensor::from_slice(&indices).to_device(self.actions.device());

        TensorBatch {
            observations: self.observations.index_select(0, &indices),
            states: self.states.index_select(0, &indices),
            actions: self.actions.index_select(0, &indices),
            log_probs: self.log_probs.index_select(0, &indices),
            values: self.values.index_select(0, &indices),
            advantages: self.advantages.index_select(0, &indices),
            returns: self.returns.index_select(0, &indices),
        }
    }

    /// Number of transitions
    pub fn len(&self) -> usize {
        self.actions.size()[0] as usize
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
