//! MAPPO training runner
//!
//! [`MappoRunner`] owns the environment, the actor-critic (through its
//! [`PPOTrainer`]), the rollout buffer, the return normalizer and the episode
//! tracker, and drives whole training iterations:
//!
//! ```text
//! anneal lr -> collect rollout -> GAE -> PPO epochs -> report metrics
//! ```
//!
//! Every metric is keyed by the global step, which counts agent-slot
//! transitions (`num_slots` per environment step).

use std::time::Instant;

use anyhow::{Result, bail};
use tch::{Device, Tensor};

use super::{
    episode::EpisodeTracker,
    metrics::MetricsSink,
    ppo::{MappoConfig, PPOTrainer, RunLayout, TrainingStats},
};
use crate::{
    buffer::RolloutBuffer,
    env::{VecEnv, global_states},
    policy::{ActorCritic, MlpConfig},
    utils::ReturnNormalizer,
};

/// Drives MAPPO training over a vectorized multi-agent environment
pub struct MappoRunner<E: VecEnv> {
    config: MappoConfig,
    layout: RunLayout,
    env: E,
    trainer: PPOTrainer,
    buffer: RolloutBuffer,
    normalizer: Option<ReturnNormalizer>,
    episodes: EpisodeTracker,

    obs_dim: usize,
    state_dim: usize,
    agents_per_env: usize,

    // Observation and done flags entering the next step
    next_obs: Vec<f32>,
    next_dones: Vec<bool>,

    global_step: u64,
    iteration: usize,
    start_time: Instant,
}

impl<E: VecEnv> MappoRunner<E> {
    /// Build a runner with a freshly initialized actor-critic
    ///
    /// Seeds torch from `config.seed` before the networks are created.
    pub fn new(config: MappoConfig, env: E) -> Result<Self> {
        config.validate()?;
        let action_dim = env.action_space().discrete_n()?;
        let obs_dim = env.observation_space().flat_dim();
        let state_dim = env.state_space().flat_dim();

        tch::manual_seed(config.seed as i64);
        let mlp = MlpConfig {
            hidden_dim: config.hidden_dim,
            activation: config.activation,
            cuda: config.cuda,
        };
        let policy =
            ActorCritic::with_config(obs_dim as i64, state_dim as i64, action_dim as i64, mlp);

        Self::with_policy(config, env, policy)
    }

    /// Build a runner around an existing actor-critic
    ///
    /// # Errors
    ///
    /// Fails when the action space is not discrete, when the model's input or
    /// output widths disagree with the environment, when the declared global
    /// state is not the concatenation of one replica's observations, or when
    /// the configuration is invalid.
    pub fn with_policy(config: MappoConfig, mut env: E, policy: ActorCritic) -> Result<Self> {
        config.validate()?;

        let action_dim = env.action_space().discrete_n()?;
        let obs_dim = env.observation_space().flat_dim();
        let state_dim = env.state_space().flat_dim();
        let agents_per_env = env.agents_per_env();

        if policy.action_dim() as usize != action_dim {
            bail!(
                "policy outputs {} actions but the environment has {}",
                policy.action_dim(),
                action_dim
            );
        }
        if policy.obs_dim() as usize != obs_dim {
            bail!("policy expects {}-d observations, got {}", policy.obs_dim(), obs_dim);
        }
        if state_dim != obs_dim * agents_per_env {
            bail!(
                "state space has width {} but {} agents × {}-d observations give {}",
                state_dim,
                agents_per_env,
                obs_dim,
                obs_dim * agents_per_env
            );
        }
        if policy.state_dim() as usize != state_dim {
            bail!("policy expects {}-d global states, got {}", policy.state_dim(), state_dim);
        }

        let layout = RunLayout::new(&config, agents_per_env)?;
        if env.num_slots() != layout.num_slots {
            bail!(
                "environment has {} slots, expected num_envs ({}) × agents ({}) = {}",
                env.num_slots(),
                config.num_envs,
                agents_per_env,
                layout.num_slots
            );
        }

        let next_obs = env.reset(Some(config.seed))?;
        if next_obs.len() != layout.num_slots * obs_dim {
            bail!(
                "reset returned {} values, expected {}",
                next_obs.len(),
                layout.num_slots * obs_dim
            );
        }

        tracing::info!(
            num_slots = layout.num_slots,
            agents_per_env,
            obs_dim,
            state_dim,
            action_dim,
            batch_size = layout.batch_size,
            minibatch_size = layout.minibatch_size,
            num_iterations = layout.num_iterations,
            "MAPPO setup"
        );
        tracing::info!(?config, "Hyperparameters");

        let buffer = RolloutBuffer::new(config.num_steps, layout.num_slots, obs_dim, state_dim);
        let normalizer =
            config.use_value_normalization.then(|| ReturnNormalizer::new(config.ewa_weight));
        let episodes = EpisodeTracker::new(layout.num_slots);
        let trainer = PPOTrainer::new(config.clone(), policy)?;

        Ok(Self {
            config,
            layout,
            env,
            trainer,
            buffer,
            normalizer,
            episodes,
            obs_dim,
            state_dim,
            agents_per_env,
            next_obs,
            next_dones: vec![false; layout.num_slots],
            global_step: 0,
            iteration: 0,
            start_time: Instant::now(),
        })
    }

    /// Run configuration
    pub fn config(&self) -> &MappoConfig {
        &self.config
    }

    /// Batch geometry of the run
    pub fn layout(&self) -> RunLayout {
        self.layout
    }

    /// The PPO optimizer and the model it owns
    pub fn trainer(&self) -> &PPOTrainer {
        &self.trainer
    }

    /// Current actor-critic
    pub fn policy(&self) -> &ActorCritic {
        self.trainer.policy()
    }

    /// Rollout buffer of the latest iteration
    pub fn buffer(&self) -> &RolloutBuffer {
        &self.buffer
    }

    /// Return normalizer, `None` when value normalization is off
    pub fn normalizer(&self) -> Option<&ReturnNormalizer> {
        self.normalizer.as_ref()
    }

    /// Agent-slot transitions collected so far
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Iterations completed so far
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    fn to_device(&self, data: &[f32], width: usize) -> Tensor {
        Tensor::from_slice(data)
            .view([self.layout.num_slots as i64, width as i64])
            .to_device(self.policy().device())
    }

    /// Fill the rollout buffer with `num_steps` steps of every slot
    ///
    /// Episode summaries are reported to `sink` as they happen.
    pub fn collect_rollout(&mut self, sink: &mut dyn MetricsSink) -> Result<()> {
        let num_slots = self.layout.num_slots;

        for step in 0..self.config.num_steps {
            self.global_step += num_slots as u64;

            let states = global_states(&self.next_obs, self.obs_dim, self.agents_per_env);
            self.buffer.record_inputs(step, &self.next_obs, &states, &self.next_dones);

            let obs_t = self.to_device(&self.next_obs, self.obs_dim);
            let states_t = self.to_device(&states, self.state_dim);
            let out = tch::no_grad(|| self.policy().act(&obs_t, &states_t, None));

            let actions: Vec<i64> = Vec::try_from(&out.actions.to_device(Device::Cpu))?;
            let log_probs: Vec<f32> = Vec::try_from(&out.log_probs.to_device(Device::Cpu))?;
            let values: Vec<f32> = Vec::try_from(&out.values.to_device(Device::Cpu))?;
            self.buffer.record_policy(step, &actions, &log_probs, &values);

            let result = self.env.step(&actions)?;
            if result.rewards.len() != num_slots
                || result.terminated.len() != num_slots
                || result.truncated.len() != num_slots
            {
                bail!("environment step returned results for the wrong number of slots");
            }
            if result.observations.len() != num_slots * self.obs_dim {
                bail!(
                    "environment step returned {} observation values, expected {}",
                    result.observations.len(),
                    num_slots * self.obs_dim
                );
            }

            let dones = result.dones();
            if let Some(summary) = self.episodes.step(&result.rewards, &dones) {
                let step = self.global_step;
                report(
                    sink,
                    "charts/average_per_player_episodic_return",
                    summary.average_per_player_return,
                    step,
                );
                report(sink, "charts/share_episodic_return", summary.share_return, step);
                report(sink, "charts/episodic_length", summary.episodic_length, step);
            }

            self.buffer.record_rewards(step, &result.rewards);
            self.next_obs = result.observations;
            self.next_dones = dones;
        }

        Ok(())
    }

    /// Bootstrap from the current state and compute advantages and returns
    ///
    /// With value normalization on, stored and bootstrap values are first
    /// mapped back to raw return space.
    pub fn compute_advantages(&mut self) -> Result<()> {
        let states = global_states(&self.next_obs, self.obs_dim, self.agents_per_env);
        let states_t = self.to_device(&states, self.state_dim);
        let next_values = tch::no_grad(|| self.policy().value(&states_t));
        let mut next_values: Vec<f32> = Vec::try_from(&next_values.to_device(Device::Cpu))?;

        if let Some(normalizer) = &self.normalizer {
            self.buffer.denormalize_values(normalizer);
            normalizer.denormalize_slice(&mut next_values);
        }

        self.buffer.compute_advantages(
            &next_values,
            &self.next_dones,
            self.config.gamma as f32,
            self.config.gae_lambda as f32,
        );
        Ok(())
    }

    /// Run one full iteration and report its diagnostics
    pub fn train_iteration(&mut self, sink: &mut dyn MetricsSink) -> Result<TrainingStats> {
        self.iteration += 1;
        let lr = self.config.learning_rate_at(self.iteration, self.layout.num_iterations);
        self.trainer.set_learning_rate(lr);

        self.collect_rollout(sink)?;
        self.compute_advantages()?;

        let batch = self.buffer.to_tensors(self.policy().device());
        let stats =
            self.trainer.train_step(&batch, self.layout.minibatch_size, self.normalizer.as_mut())?;

        let step = self.global_step;
        let sps = step as f64 / self.start_time.elapsed().as_secs_f64().max(f64::EPSILON);
        let mut scalars = vec![
            ("charts/learning_rate", lr),
            ("losses/gradnorm", stats.grad_norm),
            ("losses/value_loss", stats.value_loss),
            ("losses/policy_loss", stats.policy_loss),
            ("losses/entropy", stats.entropy),
            ("losses/old_approx_kl", stats.old_approx_kl),
            ("losses/approx_kl", stats.approx_kl),
            ("losses/clipfrac", stats.clip_fraction),
            ("losses/valueclipfrac", stats.value_clip_fraction),
            ("losses/explained_variance", stats.explained_variance),
            ("charts/SPS", sps.floor()),
        ];
        if let Some(normalizer) = &self.normalizer {
            scalars.push(("stats/value_normalizer_mean", normalizer.mean()));
            scalars.push(("stats/value_normalizer_var", normalizer.var()));
        }
        for (key, value) in scalars {
            report(sink, key, value, step);
        }

        if self.iteration % self.config.log_interval == 0 {
            tracing::info!(
                "Iteration {}/{} | step {} | policy {:.4} | value {:.4} | entropy {:.3} | kl {:.5} | ev {:.3} | sps {:.0}",
                self.iteration,
                self.layout.num_iterations,
                step,
                stats.policy_loss,
                stats.value_loss,
                stats.entropy,
                stats.approx_kl,
                stats.explained_variance,
                sps
            );
        }

        Ok(stats)
    }

    /// Run every remaining iteration
    pub fn train(&mut self, sink: &mut dyn MetricsSink) -> Result<()> {
        while self.iteration < self.layout.num_iterations {
            self.train_iteration(sink)?;
        }
        if let Err(err) = sink.flush() {
            tracing::warn!("Failed to flush metrics: {:#}", err);
        }
        Ok(())
    }
}

/// Record one scalar; a failing sink is logged and training goes on
fn report(sink: &mut dyn MetricsSink, key: &str, value: f64, step: u64) {
    if let Err(err) = sink.record_scalar(key, value, step) {
        tracing::warn!(key, step, "Failed to record metric: {:#}", err);
    }
}
