//! Training statistics for MAPPO
//!
//! This module defines the diagnostics reported by one optimization phase.

/// Training statistics for one MAPPO update
///
/// Loss, entropy, KL and gradient-norm fields describe the last minibatch
/// processed; clip fractions are averaged over every minibatch.
#[derive(Debug, Clone, Default)]
pub struct TrainingStats {
    /// Clipped surrogate policy loss
    pub policy_loss: f64,

    /// Value function loss
    pub value_loss: f64,

    /// Mean policy entropy
    pub entropy: f64,

    /// `mean(ratio - 1 - log(ratio))`
    pub approx_kl: f64,

    /// `mean(-log(ratio))`
    pub old_approx_kl: f64,

    /// Global gradient norm before clipping
    pub grad_norm: f64,

    /// Fraction of clipped policy updates
    pub clip_fraction: f64,

    /// Fraction of samples where the clipped value loss was larger
    pub value_clip_fraction: f64,

    /// Explained variance of value predictions over the whole batch
    pub explained_variance: f64,

    /// Epochs started
    pub epochs: usize,

    /// Number of gradient updates performed
    pub num_updates: usize,

    /// Whether KL early stopping cut the epochs short
    pub early_stopped: bool,
}

impl TrainingStats {
    /// Create zero-initialized statistics
    pub fn zeros() -> Self {
        Self::default()
    }
}

/// Running sum of per-minibatch clip fractions
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClipFractions {
    policy: f64,
    value: f64,
    count: usize,
}

impl ClipFractions {
    pub(crate) fn add(&mut self, policy: f64, value: f64) {
        self.policy += policy;
        self.value += value;
        self.count += 1;
    }

    /// Mean `(policy, value)` clip fractions, zero when nothing was recorded
    pub(crate) fn mean(&self) -> (f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0);
        }
        let n = self.count as f64;
        (self.policy / n, self.value / n)
    }
}
