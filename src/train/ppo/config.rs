//! MAPPO configuration and hyperparameters
//!
//! This module defines the configuration parameters for MAPPO training and
//! provides validation, builder methods, JSON loading, and the batch layout
//! derived from a configuration.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::policy::Activation;

/// MAPPO configuration parameters
///
/// Defaults match the cooperative particle-environment setup: 128 replicas,
/// 25-step rollouts, one minibatch, 15 epochs, Huber value loss, and value
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappoConfig {
    /// Total environment steps (summed over all slots) to train for
    pub total_timesteps: usize,

    /// Steps per rollout
    pub num_steps: usize,

    /// Number of parallel replicas
    pub num_envs: usize,

    /// Learning rate for actor and critic
    pub learning_rate: f64,

    /// Linearly anneal the learning rate to zero over training
    pub anneal_lr: bool,

    /// Discount factor (gamma)
    pub gamma: f64,

    /// GAE lambda parameter
    pub gae_lambda: f64,

    /// Minibatches per epoch
    pub num_minibatches: usize,

    /// Optimization epochs per rollout
    pub update_epochs: usize,

    /// Normalize advantages within each minibatch
    pub norm_adv: bool,

    /// PPO clipping parameter (epsilon), also used for value clipping
    pub clip_coef: f64,

    /// Clip the value update around the target
    pub clip_vloss: bool,

    /// Entropy bonus coefficient
    pub ent_coef: f64,

    /// Value loss coefficient
    pub vf_coef: f64,

    /// Maximum global gradient norm
    pub max_grad_norm: f64,

    /// Target KL divergence for early stopping
    pub target_kl: Option<f64>,

    /// Huber instead of squared-error value loss
    pub use_huber_loss: bool,

    /// Huber transition point
    pub huber_delta: f64,

    /// Regress the critic onto normalized returns
    pub use_value_normalization: bool,

    /// Decay of the return normalizer's moving average
    pub ewa_weight: f64,

    /// Hidden-layer nonlinearity
    pub activation: Activation,

    /// Width of the hidden layers
    pub hidden_dim: i64,

    /// Adam epsilon
    pub adam_eps: f64,

    /// Use CUDA when available
    pub cuda: bool,

    /// Seed for torch, the sampler and the environments
    pub seed: u64,

    /// Emit an iteration summary every this many iterations
    pub log_interval: usize,
}

impl Default for MappoConfig {
    fn default() -> Self {
        Self {
            total_timesteps: 100_000_000,
            num_steps: 25,
            num_envs: 128,
            learning_rate: 2.5e-4,
            anneal_lr: true,
            gamma: 0.99,
            gae_lambda: 0.95,
            num_minibatches: 1,
            update_epochs: 15,
            norm_adv: true,
            clip_coef: 0.2,
            clip_vloss: true,
            ent_coef: 0.01,
            vf_coef: 2.0,
            max_grad_norm: 10.0,
            target_kl: None,
            use_huber_loss: true,
            huber_delta: 10.0,
            use_value_normalization: true,
            ewa_weight: 0.999999,
            activation: Activation::ReLU,
            hidden_dim: 64,
            adam_eps: 1e-5,
            cuda: true,
            seed: 1,
            log_interval: 1,
        }
    }
}

impl MappoConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object over the defaults and validate it
    ///
    /// Keys missing from the file keep their default value; unknown keys are
    /// rejected.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse a JSON object over the defaults and validate it
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.total_timesteps == 0 {
            return Err(anyhow!("total_timesteps must be positive"));
        }
        if self.num_steps == 0 {
            return Err(anyhow!("num_steps must be positive"));
        }
        if self.num_envs == 0 {
            return Err(anyhow!("num_envs must be positive"));
        }
        if self.learning_rate <= 0.0 {
            return Err(anyhow!("learning_rate must be positive"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(anyhow!("gamma must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            return Err(anyhow!("gae_lambda must be in [0, 1]"));
        }
        if self.num_minibatches == 0 {
            return Err(anyhow!("num_minibatches must be positive"));
        }
        if self.update_epochs == 0 {
            return Err(anyhow!("update_epochs must be positive"));
        }
        if self.clip_coef <= 0.0 {
            return Err(anyhow!("clip_coef must be positive"));
        }
        if self.ent_coef < 0.0 {
            return Err(anyhow!("ent_coef must be non-negative"));
        }
        if self.vf_coef < 0.0 {
            return Err(anyhow!("vf_coef must be non-negative"));
        }
        if self.max_grad_norm <= 0.0 {
            return Err(anyhow!("max_grad_norm must be positive"));
        }
        if let Some(kl) = self.target_kl
            && kl < 0.0
        {
            return Err(anyhow!("target_kl must be non-negative"));
        }
        if self.huber_delta <= 0.0 {
            return Err(anyhow!("huber_delta must be positive"));
        }
        if !(0.0..1.0).contains(&self.ewa_weight) {
            return Err(anyhow!("ewa_weight must be in [0, 1)"));
        }
        if self.hidden_dim <= 0 {
            return Err(anyhow!("hidden_dim must be positive"));
        }
        if self.adam_eps <= 0.0 {
            return Err(anyhow!("adam_eps must be positive"));
        }
        if self.log_interval == 0 {
            return Err(anyhow!("log_interval must be positive"));
        }
        Ok(())
    }

    /// Learning rate for a 1-based `iteration` out of `num_iterations`
    pub fn learning_rate_at(&self, iteration: usize, num_iterations: usize) -> f64 {
        if !self.anneal_lr || num_iterations == 0 {
            return self.learning_rate;
        }
        let frac = 1.0 - (iteration.saturating_sub(1)) as f64 / num_iterations as f64;
        frac * self.learning_rate
    }

    /// Set total training steps
    pub fn total_timesteps(mut self, steps: usize) -> Self {
        self.total_timesteps = steps;
        self
    }

    /// Set rollout length
    pub fn num_steps(mut self, steps: usize) -> Self {
        self.num_steps = steps;
        self
    }

    /// Set number of parallel replicas
    pub fn num_envs(mut self, envs: usize) -> Self {
        self.num_envs = envs;
        self
    }

    /// Set learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Enable or disable learning-rate annealing
    pub fn anneal_lr(mut self, anneal: bool) -> Self {
        self.anneal_lr = anneal;
        self
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn gae_lambda(mut self, lambda: f64) -> Self {
        self.gae_lambda = lambda;
        self
    }

    /// Set minibatches per epoch
    pub fn num_minibatches(mut self, n: usize) -> Self {
        self.num_minibatches = n;
        self
    }

    /// Set number of optimization epochs
    pub fn update_epochs(mut self, epochs: usize) -> Self {
        self.update_epochs = epochs;
        self
    }

    /// Enable or disable advantage normalization
    pub fn norm_adv(mut self, norm: bool) -> Self {
        self.norm_adv = norm;
        self
    }

    /// Set PPO clipping parameter
    pub fn clip_coef(mut self, clip: f64) -> Self {
        self.clip_coef = clip;
        self
    }

    /// Enable or disable value clipping
    pub fn clip_vloss(mut self, clip: bool) -> Self {
        self.clip_vloss = clip;
        self
    }

    /// Set entropy bonus coefficient
    pub fn ent_coef(mut self, coef: f64) -> Self {
        self.ent_coef = coef;
        self
    }

    /// Set value loss coefficient
    pub fn vf_coef(mut self, coef: f64) -> Self {
        self.vf_coef = coef;
        self
    }

    /// Set maximum gradient norm
    pub fn max_grad_norm(mut self, norm: f64) -> Self {
        self.max_grad_norm = norm;
        self
    }

    /// Set target KL divergence
    pub fn target_kl(mut self, kl: f64) -> Self {
        self.target_kl = Some(kl);
        self
    }

    /// Choose Huber (`true`) or squared-error value loss
    pub fn use_huber_loss(mut self, huber: bool) -> Self {
        self.use_huber_loss = huber;
        self
    }

    /// Set Huber transition point
    pub fn huber_delta(mut self, delta: f64) -> Self {
        self.huber_delta = delta;
        self
    }

    /// Enable or disable return normalization
    pub fn use_value_normalization(mut self, normalize: bool) -> Self {
        self.use_value_normalization = normalize;
        self
    }

    /// Set return normalizer decay
    pub fn ewa_weight(mut self, weight: f64) -> Self {
        self.ewa_weight = weight;
        self
    }

    /// Set hidden-layer nonlinearity
    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Set hidden-layer width
    pub fn hidden_dim(mut self, dim: i64) -> Self {
        self.hidden_dim = dim;
        self
    }

    /// Allow or forbid CUDA
    pub fn cuda(mut self, cuda: bool) -> Self {
        self.cuda = cuda;
        self
    }

    /// Set seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set logging interval in iterations
    pub fn log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval;
        self
    }
}

/// Batch geometry derived from a configuration and an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLayout {
    /// Replicas × agents per replica
    pub num_slots: usize,

    /// Transitions per rollout (`num_steps * num_slots`)
    pub batch_size: usize,

    /// Transitions per minibatch (`batch_size / num_minibatches`)
    pub minibatch_size: usize,

    /// Iterations to run (`total_timesteps / batch_size`)
    pub num_iterations: usize,
}

impl RunLayout {
    /// Derive the layout for `agents_per_env` agents per replica
    pub fn new(config: &MappoConfig, agents_per_env: usize) -> Result<Self> {
        let num_slots = config.num_envs * agents_per_env;
        let batch_size = config.num_steps * num_slots;
        if batch_size == 0 {
            return Err(anyhow!("batch size is zero (num_envs, num_steps and agents must be positive)"));
        }

        let minibatch_size = batch_size / config.num_minibatches;
        if minibatch_size == 0 {
            return Err(anyhow!(
                "num_minibatches ({}) exceeds batch size ({})",
                config.num_minibatches,
                batch_size
            ));
        }

        let num_iterations = config.total_timesteps / batch_size;
        if num_iterations == 0 {
            return Err(anyhow!(
                "total_timesteps ({}) is smaller than one batch ({})",
                config.total_timesteps,
                batch_size
            ));
        }

        Ok(Self { num_slots, batch_size, minibatch_size, num_iterations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MappoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.learning_rate, 2.5e-4);
        assert_eq!(config.update_epochs, 15);
        assert_eq!(config.vf_coef, 2.0);
        assert_eq!(config.target_kl, None);
        assert_eq!(config.activation, Activation::ReLU);
    }

    #[test]
    fn test_config_validation() {
        assert!(MappoConfig::new().learning_rate(-1.0).validate().is_err());
        assert!(MappoConfig::new().gamma(1.5).validate().is_err());
        assert!(MappoConfig::new().update_epochs(0).validate().is_err());
        assert!(MappoConfig::new().num_minibatches(0).validate().is_err());
        assert!(MappoConfig::new().clip_coef(0.0).validate().is_err());
        assert!(MappoConfig::new().ewa_weight(1.0).validate().is_err());
        assert!(MappoConfig::new().target_kl(-0.1).validate().is_err());
        assert!(MappoConfig::new().huber_delta(0.0).validate().is_err());

        // Zero coefficients are allowed
        assert!(MappoConfig::new().vf_coef(0.0).ent_coef(0.0).validate().is_ok());
        assert!(MappoConfig::new().ewa_weight(0.0).validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MappoConfig::new().num_envs(4).num_steps(10).target_kl(0.02).gamma(0.95);

        assert_eq!(config.num_envs, 4);
        assert_eq!(config.num_steps, 10);
        assert_eq!(config.target_kl, Some(0.02));
        assert_eq!(config.gamma, 0.95);

        // Other values should remain default
        assert_eq!(config.gae_lambda, 0.95);
        assert_eq!(config.clip_coef, 0.2);
    }

    #[test]
    fn test_partial_json_config() {
        let config = MappoConfig::from_json_str(
            r#"{"num_envs": 8, "activation": "tanh", "target_kl": 0.015, "use_huber_loss": false}"#,
        )
        .unwrap();

        assert_eq!(config.num_envs, 8);
        assert_eq!(config.activation, Activation::Tanh);
        assert_eq!(config.target_kl, Some(0.015));
        assert!(!config.use_huber_loss);
        assert_eq!(config.update_epochs, 15);
    }

    #[test]
    fn test_json_rejects_unknown_and_invalid() {
        assert!(MappoConfig::from_json_str(r#"{"num_env": 8}"#).is_err());
        assert!(MappoConfig::from_json_str(r#"{"gamma": 2.0}"#).is_err());
    }

    #[test]
    fn test_learning_rate_annealing() {
        let config = MappoConfig::new().learning_rate(1.0);

        assert_eq!(config.learning_rate_at(1, 4), 1.0);
        assert_eq!(config.learning_rate_at(2, 4), 0.75);
        assert_eq!(config.learning_rate_at(4, 4), 0.25);

        let constant = config.anneal_lr(false);
        assert_eq!(constant.learning_rate_at(4, 4), 1.0);
    }

    #[test]
    fn test_run_layout() {
        let config = MappoConfig::new().num_envs(128).num_steps(25).num_minibatches(1);
        let layout = RunLayout::new(&config, 3).unwrap();

        assert_eq!(layout.num_slots, 384);
        assert_eq!(layout.batch_size, 9600);
        assert_eq!(layout.minibatch_size, 9600);
        assert_eq!(layout.num_iterations, 100_000_000 / 9600);
    }

    #[test]
    fn test_run_layout_rejects_degenerate_sizes() {
        let config = MappoConfig::new().num_envs(1).num_steps(2).num_minibatches(8);
        assert!(RunLayout::new(&config, 2).is_err());

        let config = MappoConfig::new().num_envs(4).total_timesteps(10);
        assert!(RunLayout::new(&config, 3).is_err());
    }
}
