//! Loss computation functions for MAPPO
//!
//! This module contains the core loss computation functions used in MAPPO
//! training: the clipped policy surrogate with its KL diagnostics, advantage
//! normalization, the Huber/squared value loss with optional clipping, and
//! explained variance.

use anyhow::Result;
use tch::{Kind, Reduction, Tensor};

/// Output of [`compute_policy_loss`]
#[derive(Debug)]
pub struct PolicyLoss {
    /// Clipped surrogate loss (differentiable scalar)
    pub loss: Tensor,

    /// Fraction of samples with `|ratio - 1| > clip_coef`
    pub clip_fraction: f64,

    /// `mean(ratio - 1 - log(ratio))`
    pub approx_kl: f64,

    /// `mean(-log(ratio))`
    pub old_approx_kl: f64,
}

/// Compute PPO policy loss with clipping
///
/// # Arguments
/// * `log_probs` - Log probabilities of actions under current policy
/// * `old_log_probs` - Log probabilities of actions under rollout policy
/// * `advantages` - Advantages (already normalized if requested)
/// * `clip_coef` - PPO clipping parameter (epsilon)
pub fn compute_policy_loss(
    log_probs: &Tensor,
    old_log_probs: &Tensor,
    advantages: &Tensor,
    clip_coef: f64,
) -> Result<PolicyLoss> {
    let log_ratio = log_probs - old_log_probs;
    let ratio = log_ratio.exp();

    let (approx_kl, old_approx_kl, clip_fraction) = tch::no_grad(|| {
        let approx_kl = (&ratio - 1.0 - &log_ratio).mean(Kind::Float);
        let old_approx_kl = (-&log_ratio).mean(Kind::Float);
        let clip_fraction = (&ratio - 1.0).abs().gt(clip_coef).to_kind(Kind::Float).mean(Kind::Float);
        (approx_kl, old_approx_kl, clip_fraction)
    });

    let surrogate = advantages * &ratio;
    let clipped_surrogate = advantages * ratio.clamp(1.0 - clip_coef, 1.0 + clip_coef);
    let loss = -surrogate.minimum(&clipped_surrogate).mean(Kind::Float);

    Ok(PolicyLoss {
        loss,
        clip_fraction: f64::try_from(&clip_fraction)?,
        approx_kl: f64::try_from(&approx_kl)?,
        old_approx_kl: f64::try_from(&old_approx_kl)?,
    })
}

/// Standardize advantages within a minibatch
///
/// Uses the unbiased standard deviation. A single-sample minibatch has no
/// spread to divide by and is returned unchanged.
pub fn normalize_advantages(advantages: &Tensor) -> Tensor {
    if advantages.numel() <= 1 {
        return advantages.shallow_clone();
    }
    let mean = advantages.mean(Kind::Float);
    let std = advantages.std(true);
    (advantages - mean) / (std + 1e-8)
}

/// Elementwise value regression loss
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueLossKind {
    /// Huber loss
    Huber {
        /// Error magnitude where the loss turns from quadratic to linear
        delta: f64,
    },
    /// `0.5 * error^2`
    Squared,
}

impl ValueLossKind {
    /// Per-sample loss of `predictions` against `targets`
    pub fn elementwise(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        match *self {
            ValueLossKind::Huber { delta } => predictions.huber_loss(targets, Reduction::None, delta),
            ValueLossKind::Squared => (predictions - targets).square() * 0.5,
        }
    }
}

/// Compute value function loss with optional clipping
///
/// With clipping, the prediction is also clamped to within `clip_coef` of the
/// target and the elementwise maximum of the clipped and unclipped losses is
/// averaged.
///
/// Returns `(value_loss, value_clip_fraction)`; the fraction counts samples
/// where the clipped loss exceeds the unclipped one and is zero without
/// clipping.
///
/// # Arguments
/// * `values` - Predicted values under current critic
/// * `targets` - Regression targets (normalized returns when normalization is on)
/// * `kind` - Elementwise loss
/// * `clip_coef` - Value clipping parameter, `None` disables clipping
pub fn compute_value_loss(
    values: &Tensor,
    targets: &Tensor,
    kind: ValueLossKind,
    clip_coef: Option<f64>,
) -> Result<(Tensor, f64)> {
    let unclipped = kind.elementwise(values, targets);

    let Some(clip) = clip_coef else {
        return Ok((unclipped.mean(Kind::Float), 0.0));
    };

    let values_clipped = targets + (values - targets).clamp(-clip, clip);
    let clipped = kind.elementwise(&values_clipped, targets);

    let clip_fraction =
        tch::no_grad(|| clipped.gt_tensor(&unclipped).to_kind(Kind::Float).mean(Kind::Float));
    let value_loss = unclipped.max_other(&clipped).mean(Kind::Float);

    Ok((value_loss, f64::try_from(&clip_fraction)?))
}

/// Explained variance `1 - Var(returns - values) / Var(returns)`
///
/// Population variances over the whole batch; NaN when the returns have no
/// variance.
pub fn explained_variance(values: &[f32], returns: &[f32]) -> f64 {
    debug_assert_eq!(values.len(), returns.len());

    fn variance(xs: impl Iterator<Item = f64> + Clone) -> f64 {
        let n = xs.clone().count() as f64;
        let mean = xs.clone().sum::<f64>() / n;
        xs.map(|x| (x - mean).powi(2)).sum::<f64>() / n
    }

    let var_returns = variance(returns.iter().map(|&r| r as f64));
    if var_returns == 0.0 || var_returns.is_nan() {
        return f64::NAN;
    }
    let residuals = returns.iter().zip(values).map(|(&r, &v)| r as f64 - v as f64);
    1.0 - variance(residuals) / var_returns
}
