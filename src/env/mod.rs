//! Environment traits and implementations
//!
//! The trainer talks to environments through [`VecEnv`]: a batched interface
//! over `num_slots` independent (replica × agent) streams. Every observation,
//! reward and flag is laid out slot-major, with slot index
//! `replica * agents_per_env + agent`.
//!
//! [`MultiAgentEnvironment`] describes a single replica with a fixed number of
//! cooperative agents; [`pool::EnvPool`] vectorizes many replicas into a
//! [`VecEnv`].

use anyhow::{Result, bail};

pub mod pool;
pub mod spread;

/// A single environment replica with a fixed number of agents
///
/// All agents act simultaneously; each receives its own local observation and
/// reward.
pub trait MultiAgentEnvironment {
    /// Number of agents in this replica
    fn num_agents(&self) -> usize;

    /// Reset the replica and return one observation per agent
    fn reset(&mut self, seed: Option<u64>) -> Vec<Vec<f32>>;

    /// Step all agents at once
    ///
    /// # Arguments
    ///
    /// * `actions` - One discrete action per agent
    fn step(&mut self, actions: &[i64]) -> MultiAgentStep;

    /// Space of a single agent's observation
    fn observation_space(&self) -> SpaceInfo;

    /// Space of a single agent's action
    fn action_space(&self) -> SpaceInfo;
}

/// Result of stepping one replica
#[derive(Debug, Clone)]
pub struct MultiAgentStep {
    /// Next observation for each agent
    pub observations: Vec<Vec<f32>>,

    /// Reward for each agent
    pub rewards: Vec<f32>,

    /// Terminal flags for each agent
    pub terminated: Vec<bool>,

    /// Truncation flags for each agent
    pub truncated: Vec<bool>,
}

impl MultiAgentStep {
    /// Whether every agent is terminated or truncated
    pub fn all_done(&self) -> bool {
        self.terminated.iter().zip(&self.truncated).all(|(&term, &trunc)| term || trunc)
    }
}

/// Batched environment over flattened agent slots
///
/// `step` is atomic: it either returns results for every slot or an error.
pub trait VecEnv {
    /// Total number of slots (replicas × agents per replica)
    fn num_slots(&self) -> usize;

    /// Number of agents sharing one replica (and one global state)
    fn agents_per_env(&self) -> usize;

    /// Space of a single slot's observation
    fn observation_space(&self) -> SpaceInfo;

    /// Space of a single slot's action
    fn action_space(&self) -> SpaceInfo;

    /// Space of the global state fed to the centralized critic
    fn state_space(&self) -> SpaceInfo;

    /// Reset every replica and return observations `[num_slots * obs_dim]`
    fn reset(&mut self, seed: Option<u64>) -> Result<Vec<f32>>;

    /// Step every slot with one action each
    fn step(&mut self, actions: &[i64]) -> Result<VecStep>;
}

/// Result of stepping a [`VecEnv`]
#[derive(Debug, Clone)]
pub struct VecStep {
    /// Next observations `[num_slots * obs_dim]`
    pub observations: Vec<f32>,

    /// Rewards `[num_slots]`
    pub rewards: Vec<f32>,

    /// Termination flags `[num_slots]`
    pub terminated: Vec<bool>,

    /// Truncation flags `[num_slots]`
    pub truncated: Vec<bool>,
}

impl VecStep {
    /// Elementwise `terminated || truncated`
    pub fn dones(&self) -> Vec<bool> {
        self.terminated.iter().zip(&self.truncated).map(|(&term, &trunc)| term || trunc).collect()
    }
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Data type
    pub space_type: SpaceType,
}

impl SpaceInfo {
    /// Discrete space with `n` choices
    pub fn discrete(n: usize) -> Self {
        Self { shape: vec![], space_type: SpaceType::Discrete(n) }
    }

    /// Continuous box of the given shape
    pub fn continuous(shape: Vec<usize>) -> Self {
        Self { shape, space_type: SpaceType::Continuous }
    }

    /// Number of scalar elements in one sample
    pub fn flat_dim(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of actions of a discrete space
    pub fn discrete_n(&self) -> Result<usize> {
        match self.space_type {
            SpaceType::Discrete(n) => Ok(n),
            other => bail!("only discrete action spaces are supported, got {:?}", other),
        }
    }
}

/// Space data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceType {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Continuous,
}

/// Build per-slot global states from per-slot observations
///
/// The global state of a replica is the concatenation of the observations of
/// all its agents; every agent of that replica receives the same copy.
///
/// # Arguments
///
/// * `observations` - Flat observations `[num_slots * obs_dim]`
/// * `obs_dim` - Width of one observation
/// * `agents_per_env` - Agents per replica
///
/// # Returns
///
/// Flat global states `[num_slots * agents_per_env * obs_dim]`
pub fn global_states(observations: &[f32], obs_dim: usize, agents_per_env: usize) -> Vec<f32> {
    let state_dim = obs_dim * agents_per_env;
    debug_assert_eq!(observations.len() % state_dim, 0, "observations do not split into replicas");

    let mut states = Vec::with_capacity(observations.len() * agents_per_env);
    for replica in observations.chunks(state_dim) {
        for _ in 0..agents_per_env {
            states.extend_from_slice(replica);
        }
    }
    states
}
