//! Rollout buffer storage and data management
//!
//! This module handles the core storage functionality for rollout buffers,
//! including data insertion, retrieval, and conversion to training tensors.

use tch::{Device, Tensor};

use super::{gae::compute_gae, sampling::TensorBatch};
use crate::utils::ReturnNormalizer;

/// Rollout buffer for storing trajectories
///
/// Holds one iteration of experience for every agent slot. `dones[t]` is the
/// done flag *entering* step `t`, i.e. whether the observation recorded at
/// step `t` is the first of a new episode.
///
/// # Example
///
/// ```rust
/// use thrust_mappo::buffer::RolloutBuffer;
///
/// // 25 steps over 6 slots, 14-d observations, 42-d global states
/// let mut buffer = RolloutBuffer::new(25, 6, 14, 42);
///
/// buffer.record_inputs(0, &vec![0.0; 6 * 14], &vec![0.0; 6 * 42], &[false; 6]);
/// buffer.record_policy(0, &[0; 6], &[-1.6; 6], &[0.0; 6]);
/// buffer.record_rewards(0, &[0.0; 6]);
/// ```
#[derive(Debug, Clone)]
pub struct RolloutBuffer {
    /// Number of steps per rollout
    num_steps: usize,

    /// Number of agent slots
    num_slots: usize,

    /// Width of one local observation
    obs_dim: usize,

    /// Width of one global state
    state_dim: usize,

    /// Observations [num_steps, num_slots, obs_dim]
    observations: Vec<f32>,

    /// Global states [num_steps, num_slots, state_dim]
    states: Vec<f32>,

    /// Actions taken [num_steps, num_slots]
    actions: Vec<i64>,

    /// Log probabilities of the actions [num_steps, num_slots]
    log_probs: Vec<f32>,

    /// Rewards received [num_steps, num_slots]
    rewards: Vec<f32>,

    /// Done flags entering each step [num_steps, num_slots]
    dones: Vec<bool>,

    /// Value estimates [num_steps, num_slots]
    values: Vec<f32>,

    /// Computed advantages [num_steps, num_slots]
    advantages: Vec<f32>,

    /// Computed returns [num_steps, num_slots]
    returns: Vec<f32>,
}

impl RolloutBuffer {
    /// Create a new rollout buffer
    ///
    /// # Arguments
    ///
    /// * `num_steps` - Number of timesteps per rollout
    /// * `num_slots` - Number of agent slots (replicas × agents)
    /// * `obs_dim` - Width of one observation
    /// * `state_dim` - Width of one global state
    pub fn new(num_steps: usize, num_slots: usize, obs_dim: usize, state_dim: usize) -> Self {
        let n = num_steps * num_slots;
        Self {
            num_steps,
            num_slots,
            obs_dim,
            state_dim,
            observations: vec![0.0; n * obs_dim],
            states: vec![0.0; n * state_dim],
            actions: vec![0; n],
            log_probs: vec![0.0; n],
            rewards: vec![0.0; n],
            dones: vec![false; n],
            values: vec![0.0; n],
            advantages: vec![0.0; n],
            returns: vec![0.0; n],
        }
    }

    fn row(&self, step: usize) -> std::ops::Range<usize> {
        debug_assert!(step < self.num_steps, "step {} >= num_steps {}", step, self.num_steps);
        step * self.num_slots..(step + 1) * self.num_slots
    }

    /// Record what the policy is about to see at `step`
    pub fn record_inputs(
        &mut self,
        step: usize,
        observations: &[f32],
        states: &[f32],
        dones: &[bool],
    ) {
        let row = self.row(step);
        debug_assert_eq!(observations.len(), self.num_slots * self.obs_dim, "observation mismatch");
        debug_assert_eq!(states.len(), self.num_slots * self.state_dim, "state mismatch");

        let (obs_dim, state_dim) = (self.obs_dim, self.state_dim);
        self.observations[row.start * obs_dim..row.end * obs_dim].copy_from_slice(observations);
        self.states[row.start * state_dim..row.end * state_dim].copy_from_slice(states);
        self.dones[row].copy_from_slice(dones);
    }

    /// Record the policy's outputs at `step`
    pub fn record_policy(
        &mut self,
        step: usize,
        actions: &[i64],
        log_probs: &[f32],
        values: &[f32],
    ) {
        let row = self.row(step);
        self.actions[row.clone()].copy_from_slice(actions);
        self.log_probs[row.clone()].copy_from_slice(log_probs);
        self.values[row].copy_from_slice(values);
    }

    /// Record the raw environment rewards of `step`
    pub fn record_rewards(&mut self, step: usize, rewards: &[f32]) {
        let row = self.row(step);
        self.rewards[row].copy_from_slice(rewards);
    }

    /// Map stored values from normalized to raw return space in place
    pub fn denormalize_values(&mut self, normalizer: &ReturnNormalizer) {
        normalizer.denormalize_slice(&mut self.values);
    }

    /// Compute GAE advantages and returns for every slot
    ///
    /// # Arguments
    ///
    /// * `next_values` - Bootstrap values of the state after the last step [num_slots]
    /// * `next_dones` - Done flags entering that state [num_slots]
    /// * `gamma` - Discount factor
    /// * `gae_lambda` - GAE lambda parameter
    pub fn compute_advantages(
        &mut self,
        next_values: &[f32],
        next_dones: &[bool],
        gamma: f32,
        gae_lambda: f32,
    ) {
        compute_gae(
            &self.rewards,
            &self.values,
            &self.dones,
            next_values,
            next_dones,
            gamma,
            gae_lambda,
            &mut self.advantages,
            &mut self.returns,
        );
    }

    /// Flatten the whole rollout into training tensors on `device`
    pub fn to_tensors(&self, device: Device) -> TensorBatch {
        let n = self.len() as i64;
        let observations = Tensor::from_slice(&self.observations).view([n, self.obs_dim as i64]);
        let states = Tensor::from_slice(&self.states).view([n, self.state_dim as i64]);

        TensorBatch {
            observations: observations.to_device(device),
            states: states.to_device(device),
            actions: Tensor::from_slice(&self.actions).to_device(device),
            log_probs: Tensor::from_slice(&self.log_probs).to_device(device),
            values: Tensor::from_slice(&self.values).to_device(device),
            advantages: Tensor::from_slice(&self.advantages).to_device(device),
            returns: Tensor::from_slice(&self.returns).to_device(device),
        }
    }

    /// Get buffer dimensions `(num_steps, num_slots, obs_dim, state_dim)`
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.num_steps, self.num_slots, self.obs_dim, self.state_dim)
    }

    /// Number of transitions (`num_steps * num_slots`)
    pub fn len(&self) -> usize {
        self.num_steps * self.num_slots
    }

    /// Check if the buffer holds no transitions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations `[num_steps * num_slots * obs_dim]`
    pub fn observations(&self) -> &[f32] {
        &self.observations
    }

    /// Global states `[num_steps * num_slots * state_dim]`
    pub fn states(&self) -> &[f32] {
        &self.states
    }

    /// Actions taken
    pub fn actions(&self) -> &[i64] {
        &self.actions
    }

    /// Raw rewards
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    /// Done flags entering each step
    pub fn dones(&self) -> &[bool] {
        &self.dones
    }

    /// Value estimates (raw space once denormalized)
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// GAE advantages of the latest computation
    pub fn advantages(&self) -> &[f32] {
        &self.advantages
    }

    /// Returns `advantages + values`
    pub fn returns(&self) -> &[f32] {
        &self.returns
    }
}
