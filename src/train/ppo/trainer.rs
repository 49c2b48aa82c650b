//! PPO Trainer implementation
//!
//! This module contains the PPOTrainer struct and its optimization phase: the
//! shuffled minibatch epochs that update actor and critic from one rollout.

use anyhow::Result;
use rand::{SeedableRng, rngs::StdRng};
use tch::{Device, Kind, Tensor, nn};

use super::{
    config::MappoConfig,
    loss::{
        ValueLossKind, compute_policy_loss, compute_value_loss, explained_variance,
        normalize_advantages,
    },
    stats::{ClipFractions, TrainingStats},
};
use crate::{
    buffer::{TensorBatch, generate_minibatch_indices},
    policy::ActorCritic,
    utils::ReturnNormalizer,
};

/// PPO Trainer for policy optimization
///
/// Owns the actor-critic, its Adam optimizer and the RNG that shuffles
/// minibatches, so parameters have exactly one writer.
pub struct PPOTrainer {
    config: MappoConfig,
    policy: ActorCritic,
    optimizer: nn::Optimizer,
    rng: StdRng,
    learning_rate: f64,
    total_updates: usize,
}

impl PPOTrainer {
    /// Create a new PPO trainer
    ///
    /// # Arguments
    ///
    /// * `config` - MAPPO configuration parameters
    /// * `policy` - Actor-critic to optimize
    pub fn new(config: MappoConfig, policy: ActorCritic) -> Result<Self> {
        config.validate()?;

        let optimizer = policy.optimizer(config.learning_rate, config.adam_eps)?;
        let rng = StdRng::seed_from_u64(config.seed);
        let learning_rate = config.learning_rate;

        Ok(Self { config, policy, optimizer, rng, learning_rate, total_updates: 0 })
    }

    /// Get reference to the policy
    pub fn policy(&self) -> &ActorCritic {
        &self.policy
    }

    /// Get mutable reference to the policy
    pub fn policy_mut(&mut self) -> &mut ActorCritic {
        &mut self.policy
    }

    /// Get the configuration
    pub fn config(&self) -> &MappoConfig {
        &self.config
    }

    /// Current optimizer learning rate
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Set the optimizer learning rate
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.optimizer.set_lr(lr);
        self.learning_rate = lr;
    }

    /// Gradient updates performed so far
    pub fn total_updates(&self) -> usize {
        self.total_updates
    }

    fn value_loss_kind(&self) -> ValueLossKind {
        if self.config.use_huber_loss {
            ValueLossKind::Huber { delta: self.config.huber_delta }
        } else {
            ValueLossKind::Squared
        }
    }

    /// Run the optimization phase over one flattened rollout
    ///
    /// For each epoch the batch is reshuffled and split into chunks of
    /// `minibatch_size` (the last one may be shorter). When a normalizer is
    /// supplied, it absorbs each minibatch's raw returns before they are
    /// normalized into critic targets.
    ///
    /// # Arguments
    ///
    /// * `batch` - Flattened rollout with raw values and returns
    /// * `minibatch_size` - Transitions per gradient update
    /// * `normalizer` - Return normalizer, `None` to regress on raw returns
    ///
    /// # Returns
    /// Training statistics for this update
    pub fn train_step(
        &mut self,
        batch: &TensorBatch,
        minibatch_size: usize,
        mut normalizer: Option<&mut ReturnNormalizer>,
    ) -> Result<TrainingStats> {
        let device = self.policy.device();
        let value_kind = self.value_loss_kind();
        let value_clip = self.config.clip_vloss.then_some(self.config.clip_coef);

        let mut stats = TrainingStats::zeros();
        let mut fractions = ClipFractions::default();

        for epoch in 0..self.config.update_epochs {
            stats.epochs += 1;
            let minibatches = generate_minibatch_indices(batch.len(), minibatch_size, &mut self.rng);

            for indices in &minibatches {
                let mb = batch.select(indices);

                // Forward pass with the stored actions
                let out = self.policy.act(&mb.observations, &mb.states, Some(&mb.actions));

                let advantages = if self.config.norm_adv {
                    normalize_advantages(&mb.advantages)
                } else {
                    mb.advantages.shallow_clone()
                };
                let policy = compute_policy_loss(
                    &out.log_probs,
                    &mb.log_probs,
                    &advantages,
                    self.config.clip_coef,
                )?;

                let targets = match normalizer.as_deref_mut() {
                    Some(normalizer) => {
                        let mut returns: Vec<f32> =
                            Vec::try_from(&mb.returns.to_device(Device::Cpu))?;
                        normalizer.update(&returns);
                        normalizer.normalize_slice(&mut returns);
                        Tensor::from_slice(&returns).to_device(device)
                    }
                    None => mb.returns.shallow_clone(),
                };
                let (value_loss, value_clip_fraction) =
                    compute_value_loss(&out.values, &targets, value_kind, value_clip)?;

                let entropy = out.entropy.mean(Kind::Float);

                let loss = &policy.loss - self.config.ent_coef * &entropy
                    + self.config.vf_coef * &value_loss;

                // Backward pass
                self.optimizer.zero_grad();
                loss.backward();

                let grad_norm = global_grad_norm(self.policy.var_store())?;
                self.optimizer.clip_grad_norm(self.config.max_grad_norm);
                self.optimizer.step();

                stats.policy_loss = f64::try_from(&policy.loss)?;
                stats.value_loss = f64::try_from(&value_loss)?;
                stats.entropy = f64::try_from(&entropy)?;
                stats.approx_kl = policy.approx_kl;
                stats.old_approx_kl = policy.old_approx_kl;
                stats.grad_norm = grad_norm;
                stats.num_updates += 1;
                fractions.add(policy.clip_fraction, value_clip_fraction);

                tracing::debug!(
                    epoch,
                    policy_loss = stats.policy_loss,
                    value_loss = stats.value_loss,
                    approx_kl = stats.approx_kl,
                    grad_norm,
                    "minibatch update"
                );
            }

            // Early stopping based on the last minibatch's KL divergence
            if let Some(target_kl) = self.config.target_kl
                && stats.approx_kl > target_kl
            {
                tracing::info!(
                    "Early stopping at epoch {} due to reaching max KL: {:.4} > {:.4}",
                    epoch,
                    stats.approx_kl,
                    target_kl
                );
                stats.early_stopped = true;
                break;
            }
        }

        (stats.clip_fraction, stats.value_clip_fraction) = fractions.mean();

        let values: Vec<f32> = Vec::try_from(&batch.values.to_device(Device::Cpu))?;
        let returns: Vec<f32> = Vec::try_from(&batch.returns.to_device(Device::Cpu))?;
        stats.explained_variance = explained_variance(&values, &returns);

        self.total_updates += stats.num_updates;
        Ok(stats)
    }
}

/// L2 norm of all trainable gradients taken together
fn global_grad_norm(vs: &nn::VarStore) -> Result<f64> {
    let mut sum_sq = 0.0;
    for var in vs.trainable_variables() {
        let grad = var.grad();
        if grad.defined() {
            sum_sq += f64::try_from(grad.square().sum(Kind::Double))?;
        }
    }
    Ok(sum_sq.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Activation, MlpConfig};

    fn cpu_policy() -> ActorCritic {
        let config = MlpConfig { hidden_dim: 16, activation: Activation::ReLU, cuda: false };
        ActorCritic::with_config(3, 6, 4, config)
    }

    fn synthetic_batch(policy: &ActorCritic, n: i64) -> TensorBatch {
        let observations = Tensor::randn([n, 3], (Kind::Float, Device::Cpu));
        let states = Tensor::randn([n, 6], (Kind::Float, Device::Cpu));
        let out = tch::no_grad(|| policy.act(&observations, &states, None));
        let returns = Tensor::randn([n], (Kind::Float, Device::Cpu));

        TensorBatch {
            observations,
            states,
            actions: out.actions,
            log_probs: out.log_probs,
            advantages: &returns - &out.values,
            values: out.values,
            returns,
        }
    }

    #[test]
    fn test_train_step_counts_updates() {
        tch::manual_seed(0);
        let config = MappoConfig::new().update_epochs(3).cuda(false);
        let mut trainer = PPOTrainer::new(config, cpu_policy()).unwrap();
        let batch = synthetic_batch(trainer.policy(), 40);

        let stats = trainer.train_step(&batch, 16, None).unwrap();

        // 40 samples in chunks of 16 gives 3 minibatches per epoch
        assert_eq!(stats.epochs, 3);
        assert_eq!(stats.num_updates, 9);
        assert_eq!(trainer.total_updates(), 9);
        assert!(!stats.early_stopped);
        assert!(stats.grad_norm.is_finite() && stats.grad_norm > 0.0);
        assert!(stats.explained_variance.is_finite());
    }

    #[test]
    fn test_first_minibatch_has_zero_kl() {
        tch::manual_seed(1);
        let config = MappoConfig::new().update_epochs(1).cuda(false);
        let mut trainer = PPOTrainer::new(config, cpu_policy()).unwrap();
        let batch = synthetic_batch(trainer.policy(), 32);

        // A single full-batch update evaluates the rollout policy itself
        let stats = trainer.train_step(&batch, 32, None).unwrap();
        assert!(stats.approx_kl.abs() < 1e-6);
        assert!(stats.old_approx_kl.abs() < 1e-6);
        assert_eq!(stats.clip_fraction, 0.0);
    }

    #[test]
    fn test_kl_early_stopping() {
        tch::manual_seed(2);
        let config = MappoConfig::new()
            .update_epochs(50)
            .learning_rate(0.05)
            .target_kl(0.0)
            .cuda(false);
        let mut trainer = PPOTrainer::new(config, cpu_policy()).unwrap();
        let batch = synthetic_batch(trainer.policy(), 64);

        let stats = trainer.train_step(&batch, 16, None).unwrap();

        // Any policy movement exceeds a zero target after the first epoch
        assert!(stats.early_stopped);
        assert_eq!(stats.epochs, 1);
        assert_eq!(stats.num_updates, 4);
    }

    #[test]
    fn test_normalizer_sees_every_minibatch() {
        tch::manual_seed(3);
        let config = MappoConfig::new().update_epochs(2).ewa_weight(0.5).cuda(false);
        let mut trainer = PPOTrainer::new(config, cpu_policy()).unwrap();
        let batch = synthetic_batch(trainer.policy(), 20);
        let mut normalizer = ReturnNormalizer::new(0.5);

        trainer.train_step(&batch, 10, Some(&mut normalizer)).unwrap();

        // 4 updates with w = 0.5: debiasing term = 1 - 0.5^4
        let (_, _, debias) = normalizer.accumulators();
        assert!((debias - (1.0 - 0.5_f64.powi(4))).abs() < 1e-12);
    }

    #[test]
    fn test_set_learning_rate() {
        let config = MappoConfig::new().cuda(false);
        let mut trainer = PPOTrainer::new(config, cpu_policy()).unwrap();
        assert_eq!(trainer.learning_rate(), 2.5e-4);

        trainer.set_learning_rate(1e-4);
        assert_eq!(trainer.learning_rate(), 1e-4);
    }
}
