//! Vectorized environment pool for parallel execution
//!
//! This module runs many multi-agent replicas in parallel using Rayon and
//! presents them to the trainer as one flat batch of agent slots.
//!
//! # Example
//!
//! ```rust,no_run
//! use thrust_mappo::env::{VecEnv, pool::EnvPool, spread::SimpleSpread};
//!
//! // 4 replicas of a 3-agent task = 12 slots
//! let mut pool = EnvPool::new(|| SimpleSpread::new(3), 4).unwrap();
//! let observations = pool.reset(Some(1)).unwrap();
//!
//! let actions = vec![0; pool.num_slots()];
//! let step = pool.step(&actions).unwrap();
//! assert_eq!(step.rewards.len(), 12);
//! ```
//!
//! # Auto-reset
//!
//! When every agent of a replica is done after a step, that replica is reset
//! immediately and the returned observations for its slots are the first
//! observations of the new episode. Rewards and flags still describe the step
//! that ended the old episode.

use anyhow::{Result, bail};
use rayon::prelude::*;

use crate::env::{MultiAgentEnvironment, SpaceInfo, VecEnv, VecStep};

/// A pool of multi-agent replicas stepped in parallel
pub struct EnvPool<E: MultiAgentEnvironment> {
    /// Replica instances
    envs: Vec<E>,

    /// Agents in each replica
    agents_per_env: usize,

    /// Width of one agent observation
    obs_dim: usize,
}

impl<E: MultiAgentEnvironment + Send> EnvPool<E> {
    /// Create a new environment pool
    ///
    /// # Arguments
    ///
    /// * `env_fn` - Factory function to create replica instances
    /// * `num_envs` - Number of parallel replicas
    pub fn new<F>(env_fn: F, num_envs: usize) -> Result<Self>
    where
        F: Fn() -> E,
    {
        if num_envs == 0 {
            bail!("EnvPool needs at least one environment");
        }

        let envs: Vec<E> = (0..num_envs).map(|_| env_fn()).collect();
        let agents_per_env = envs[0].num_agents();
        if agents_per_env == 0 {
            bail!("environments must have at least one agent");
        }
        if envs.iter().any(|env| env.num_agents() != agents_per_env) {
            bail!("all replicas in a pool must have the same number of agents");
        }
        let obs_dim = envs[0].observation_space().flat_dim();

        Ok(Self { envs, agents_per_env, obs_dim })
    }

    /// Number of replicas in the pool
    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn flatten_observations(&self, per_replica: Vec<Vec<Vec<f32>>>) -> Result<Vec<f32>> {
        let mut flat = Vec::with_capacity(self.num_slots() * self.obs_dim);
        for agent_obs in per_replica.into_iter().flatten() {
            if agent_obs.len() != self.obs_dim {
                bail!(
                    "environment returned observation of width {}, expected {}",
                    agent_obs.len(),
                    self.obs_dim
                );
            }
            flat.extend_from_slice(&agent_obs);
        }
        Ok(flat)
    }
}

impl<E: MultiAgentEnvironment + Send> VecEnv for EnvPool<E> {
    fn num_slots(&self) -> usize {
        self.envs.len() * self.agents_per_env
    }

    fn agents_per_env(&self) -> usize {
        self.agents_per_env
    }

    fn observation_space(&self) -> SpaceInfo {
        self.envs[0].observation_space()
    }

    fn action_space(&self) -> SpaceInfo {
        self.envs[0].action_space()
    }

    fn state_space(&self) -> SpaceInfo {
        SpaceInfo::continuous(vec![self.obs_dim * self.agents_per_env])
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Vec<f32>> {
        let observations: Vec<Vec<Vec<f32>>> = self
            .envs
            .par_iter_mut()
            .enumerate()
            .map(|(i, env)| env.reset(seed.map(|s| s.wrapping_add(i as u64))))
            .collect();
        self.flatten_observations(observations)
    }

    fn step(&mut self, actions: &[i64]) -> Result<VecStep> {
        if actions.len() != self.num_slots() {
            bail!(
                "Number of actions ({}) must match number of slots ({})",
                actions.len(),
                self.num_slots()
            );
        }

        let results: Vec<_> = self
            .envs
            .par_iter_mut()
            .zip(actions.par_chunks(self.agents_per_env))
            .map(|(env, replica_actions)| {
                let mut result = env.step(replica_actions);
                if result.all_done() {
                    result.observations = env.reset(None);
                }
                result
            })
            .collect();

        let num_slots = self.num_slots();
        let mut rewards = Vec::with_capacity(num_slots);
        let mut terminated = Vec::with_capacity(num_slots);
        let mut truncated = Vec::with_capacity(num_slots);
        let mut observations = Vec::with_capacity(results.len());

        for result in results {
            if result.rewards.len() != self.agents_per_env {
                bail!("environment returned {} rewards, expected {}", result.rewards.len(), self.agents_per_env);
            }
            rewards.extend(result.rewards);
            terminated.extend(result.terminated);
            truncated.extend(result.truncated);
            observations.push(result.observations);
        }

        let observations = self.flatten_observations(observations)?;
        Ok(VecStep { observations, rewards, terminated, truncated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{MultiAgentStep, SpaceType, spread::SimpleSpread};

    /// Counts steps and ends the episode after `horizon` of them
    struct Counter {
        agents: usize,
        t: usize,
        horizon: usize,
    }

    impl MultiAgentEnvironment for Counter {
        fn num_agents(&self) -> usize {
            self.agents
        }

        fn reset(&mut self, _seed: Option<u64>) -> Vec<Vec<f32>> {
            self.t = 0;
            vec![vec![0.0]; self.agents]
        }

        fn step(&mut self, actions: &[i64]) -> MultiAgentStep {
            self.t += 1;
            let done = self.t >= self.horizon;
            MultiAgentStep {
                observations: vec![vec![self.t as f32]; self.agents],
                rewards: actions.iter().map(|&a| a as f32).collect(),
                terminated: vec![false; self.agents],
                truncated: vec![done; self.agents],
            }
        }

        fn observation_space(&self) -> SpaceInfo {
            SpaceInfo::continuous(vec![1])
        }

        fn action_space(&self) -> SpaceInfo {
            SpaceInfo::discrete(3)
        }
    }

    fn counter_pool(num_envs: usize) -> EnvPool<Counter> {
        EnvPool::new(|| Counter { agents: 2, t: 0, horizon: 2 }, num_envs).unwrap()
    }

    #[test]
    fn test_pool_creation() {
        let pool = counter_pool(3);
        assert_eq!(pool.num_envs(), 3);
        assert_eq!(pool.num_slots(), 6);
        assert_eq!(pool.agents_per_env(), 2);
        assert_eq!(pool.state_space().shape, vec![2]);
        assert_eq!(pool.action_space().space_type, SpaceType::Discrete(3));
    }

    #[test]
    fn test_pool_rejects_empty() {
        assert!(EnvPool::new(|| Counter { agents: 2, t: 0, horizon: 2 }, 0).is_err());
    }

    #[test]
    fn test_pool_step_flattens_slots() {
        let mut pool = counter_pool(2);
        pool.reset(Some(0)).unwrap();

        let step = pool.step(&[0, 1, 2, 0]).unwrap();
        assert_eq!(step.rewards, vec![0.0, 1.0, 2.0, 0.0]);
        assert_eq!(step.observations, vec![1.0; 4]);
        assert_eq!(step.dones(), vec![false; 4]);
    }

    #[test]
    fn test_pool_auto_reset() {
        let mut pool = counter_pool(2);
        pool.reset(None).unwrap();

        pool.step(&[0; 4]).unwrap();
        let step = pool.step(&[0; 4]).unwrap();

        // Episode ended on this step: flags are set, observations come from the reset
        assert_eq!(step.truncated, vec![true; 4]);
        assert_eq!(step.observations, vec![0.0; 4]);

        let step = pool.step(&[0; 4]).unwrap();
        assert_eq!(step.truncated, vec![false; 4]);
        assert_eq!(step.observations, vec![1.0; 4]);
    }

    #[test]
    fn test_pool_step_wrong_action_count() {
        let mut pool = counter_pool(2);
        pool.reset(None).unwrap();
        let err = pool.step(&[0, 1]).unwrap_err();
        assert!(err.to_string().contains("must match number of slots"));
    }

    #[test]
    fn test_pool_with_spread() {
        let mut pool = EnvPool::new(|| SimpleSpread::new(3), 4).unwrap();
        let obs_dim = pool.observation_space().flat_dim();

        let observations = pool.reset(Some(7)).unwrap();
        assert_eq!(observations.len(), 12 * obs_dim);
        assert_eq!(pool.state_space().flat_dim(), 3 * obs_dim);

        let step = pool.step(&vec![1; 12]).unwrap();
        assert_eq!(step.observations.len(), 12 * obs_dim);
        assert_eq!(step.rewards.len(), 12);
    }
}
