//! Cooperative navigation ("simple spread") particle environment
//!
//! N agents and N landmarks live on a 2-D plane. Agents are rewarded,
//! collectively, for covering every landmark and penalized individually for
//! bumping into each other. Episodes are truncated after a fixed number of
//! cycles; there is no terminal state.
//!
//! # Dynamics
//!
//! ```text
//! vel <- vel * (1 - damping) + accel * dir(action) * dt
//! pos <- pos + vel * dt
//! ```
//!
//! Actions: 0 = no-op, 1 = left, 2 = right, 3 = down, 4 = up.
//!
//! # Observation (per agent)
//!
//! `[vel (2), pos (2), landmark offsets (2N), other agent offsets (2(N-1))]`
//!
//! # Reward (per agent)
//!
//! ```text
//! shared = -Σ_landmarks min_agents |agent - landmark|
//! local  = -(number of other agents within collision distance)
//! reward = local_ratio * local + (1 - local_ratio) * shared
//! ```

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::env::{MultiAgentEnvironment, MultiAgentStep, SpaceInfo};

const NUM_ACTIONS: usize = 5;

/// Cooperative navigation task
#[derive(Debug, Clone)]
pub struct SimpleSpread {
    num_agents: usize,
    agent_pos: Vec<[f32; 2]>,
    agent_vel: Vec<[f32; 2]>,
    landmarks: Vec<[f32; 2]>,

    // Episode tracking
    cycle: usize,
    max_cycles: usize,

    // Physics constants (matching the particle-environment defaults)
    dt: f32,
    damping: f32,
    accel: f32,
    agent_size: f32,
    local_ratio: f32,

    rng: StdRng,
}

impl SimpleSpread {
    /// Create a task with `num_agents` agents and as many landmarks
    ///
    /// Defaults: 25 cycles per episode, dt = 0.1, damping = 0.25,
    /// acceleration = 5.0, agent radius = 0.15, local ratio = 0.5.
    pub fn new(num_agents: usize) -> Self {
        Self {
            num_agents,
            agent_pos: vec![[0.0; 2]; num_agents],
            agent_vel: vec![[0.0; 2]; num_agents],
            landmarks: vec![[0.0; 2]; num_agents],
            cycle: 0,
            max_cycles: 25,
            dt: 0.1,
            damping: 0.25,
            accel: 5.0,
            agent_size: 0.15,
            local_ratio: 0.5,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Set the episode length in cycles
    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Set the weight of the individual collision penalty
    pub fn with_local_ratio(mut self, local_ratio: f32) -> Self {
        self.local_ratio = local_ratio;
        self
    }

    /// Width of one agent observation
    pub fn obs_dim(&self) -> usize {
        4 + 2 * self.num_agents + 2 * (self.num_agents - 1)
    }

    fn observe(&self, agent: usize) -> Vec<f32> {
        let [x, y] = self.agent_pos[agent];
        let mut obs = Vec::with_capacity(self.obs_dim());
        obs.extend_from_slice(&self.agent_vel[agent]);
        obs.extend_from_slice(&self.agent_pos[agent]);
        for [lx, ly] in &self.landmarks {
            obs.push(lx - x);
            obs.push(ly - y);
        }
        for (other, [ox, oy]) in self.agent_pos.iter().enumerate() {
            if other != agent {
                obs.push(ox - x);
                obs.push(oy - y);
            }
        }
        obs
    }

    fn observe_all(&self) -> Vec<Vec<f32>> {
        (0..self.num_agents).map(|agent| self.observe(agent)).collect()
    }

    fn shared_reward(&self) -> f32 {
        self.landmarks
            .iter()
            .map(|&landmark| {
                self.agent_pos
                    .iter()
                    .map(|&agent| distance(agent, landmark))
                    .fold(f32::INFINITY, f32::min)
            })
            .map(|d| -d)
            .sum()
    }

    fn collisions(&self, agent: usize) -> usize {
        let min_dist = 2.0 * self.agent_size;
        (0..self.num_agents)
            .filter(|&other| {
                other != agent && distance(self.agent_pos[agent], self.agent_pos[other]) < min_dist
            })
            .count()
    }
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn direction(action: i64) -> [f32; 2] {
    match action {
        1 => [-1.0, 0.0],
        2 => [1.0, 0.0],
        3 => [0.0, -1.0],
        4 => [0.0, 1.0],
        _ => [0.0, 0.0],
    }
}

impl MultiAgentEnvironment for SimpleSpread {
    fn num_agents(&self) -> usize {
        self.num_agents
    }

    fn reset(&mut self, seed: Option<u64>) -> Vec<Vec<f32>> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        for i in 0..self.num_agents {
            self.agent_pos[i] = [self.rng.gen_range(-1.0..1.0), self.rng.gen_range(-1.0..1.0)];
            self.agent_vel[i] = [0.0; 2];
            self.landmarks[i] = [self.rng.gen_range(-1.0..1.0), self.rng.gen_range(-1.0..1.0)];
        }
        self.cycle = 0;

        self.observe_all()
    }

    fn step(&mut self, actions: &[i64]) -> MultiAgentStep {
        debug_assert_eq!(actions.len(), self.num_agents, "one action per agent");

        for (i, &action) in actions.iter().enumerate() {
            let dir = direction(action);
            for axis in 0..2 {
                let vel = self.agent_vel[i][axis] * (1.0 - self.damping)
                    + self.accel * dir[axis] * self.dt;
                self.agent_vel[i][axis] = vel;
                self.agent_pos[i][axis] += vel * self.dt;
            }
        }
        self.cycle += 1;

        let shared = self.shared_reward();
        let rewards = (0..self.num_agents)
            .map(|agent| {
                let local = -(self.collisions(agent) as f32);
                self.local_ratio * local + (1.0 - self.local_ratio) * shared
            })
            .collect();

        let truncated = self.cycle >= self.max_cycles;
        MultiAgentStep {
            observations: self.observe_all(),
            rewards,
            terminated: vec![false; self.num_agents],
            truncated: vec![truncated; self.num_agents],
        }
    }

    fn observation_space(&self) -> SpaceInfo {
        SpaceInfo::continuous(vec![self.obs_dim()])
    }

    fn action_space(&self) -> SpaceInfo {
        SpaceInfo::discrete(NUM_ACTIONS)
    }
}
