//! Return normalization for stable value learning
//!
//! This module provides an exponentially weighted running estimate of the
//! return distribution. The centralized critic regresses onto returns that
//! have been standardized with these statistics, and its predictions are
//! mapped back to raw return space before advantages are computed.
//!
//! The estimator keeps three accumulators, all starting at zero:
//!
//! ```text
//! running_mean    <- w * running_mean    + (1 - w) * mean(batch)
//! running_mean_sq <- w * running_mean_sq + (1 - w) * mean(batch^2)
//! debiasing_term  <- w * debiasing_term  + (1 - w)
//!
//! mean = running_mean    / max(debiasing_term, 1e-5)
//! var  = max(running_mean_sq / max(debiasing_term, 1e-5) - mean^2, 1e-2)
//! ```
//!
//! The debiasing term removes the pull towards zero of an average that was
//! initialized at zero, the same correction Adam applies to its moments.

/// Floor applied to the debiasing term before dividing by it
pub const DEBIASING_FLOOR: f64 = 1e-5;

/// Floor applied to the estimated variance
pub const VARIANCE_FLOOR: f64 = 1e-2;

/// Exponentially weighted return statistics
///
/// Mean and variance are derived from the accumulators on every read, so
/// there is never a stale cached copy to keep in sync.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnNormalizer {
    running_mean: f64,
    running_mean_sq: f64,
    debiasing_term: f64,
    ewa_weight: f64,
}

impl ReturnNormalizer {
    /// Create a normalizer with all accumulators at zero
    ///
    /// # Arguments
    /// * `ewa_weight` - Decay of the moving average, in `[0, 1)`. A weight of
    ///   zero keeps no memory: every update replaces the statistics with those
    ///   of the latest batch.
    pub fn new(ewa_weight: f64) -> Self {
        debug_assert!((0.0..1.0).contains(&ewa_weight), "ewa_weight must be in [0, 1)");
        Self { running_mean: 0.0, running_mean_sq: 0.0, debiasing_term: 0.0, ewa_weight }
    }

    /// Fold a batch of raw returns into the running statistics
    ///
    /// Empty batches leave the statistics untouched.
    pub fn update(&mut self, returns: &[f32]) {
        if returns.is_empty() {
            return;
        }

        let n = returns.len() as f64;
        let batch_mean = returns.iter().map(|&r| r as f64).sum::<f64>() / n;
        let batch_mean_sq = returns.iter().map(|&r| (r as f64) * (r as f64)).sum::<f64>() / n;

        let w = self.ewa_weight;
        self.running_mean = w * self.running_mean + (1.0 - w) * batch_mean;
        self.running_mean_sq = w * self.running_mean_sq + (1.0 - w) * batch_mean_sq;
        self.debiasing_term = w * self.debiasing_term + (1.0 - w);
    }

    /// Debiased running mean
    pub fn mean(&self) -> f64 {
        self.running_mean / self.debiasing_term.max(DEBIASING_FLOOR)
    }

    /// Debiased running variance, floored at [`VARIANCE_FLOOR`]
    pub fn var(&self) -> f64 {
        let mean = self.mean();
        let mean_sq = self.running_mean_sq / self.debiasing_term.max(DEBIASING_FLOOR);
        (mean_sq - mean * mean).max(VARIANCE_FLOOR)
    }

    /// Map a raw return into normalized space
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.mean()) / self.var().sqrt()
    }

    /// Map a normalized value back into raw return space
    pub fn denormalize(&self, value: f64) -> f64 {
        value * self.var().sqrt() + self.mean()
    }

    /// Normalize a slice in place
    pub fn normalize_slice(&self, values: &mut [f32]) {
        let (mean, std) = (self.mean(), self.var().sqrt());
        for v in values {
            *v = ((*v as f64 - mean) / std) as f32;
        }
    }

    /// Denormalize a slice in place
    pub fn denormalize_slice(&self, values: &mut [f32]) {
        let (mean, std) = (self.mean(), self.var().sqrt());
        for v in values {
            *v = (*v as f64 * std + mean) as f32;
        }
    }

    /// Raw accumulators `(running_mean, running_mean_sq, debiasing_term)`
    pub fn accumulators(&self) -> (f64, f64, f64) {
        (self.running_mean, self.running_mean_sq, self.debiasing_term)
    }

    /// Decay weight of the moving average
    pub fn ewa_weight(&self) -> f64 {
        self.ewa_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_start_is_floored() {
        let normalizer = ReturnNormalizer::new(0.99);

        // No data yet: mean is zero and the variance sits on its floor
        assert_eq!(normalizer.mean(), 0.0);
        assert_eq!(normalizer.var(), VARIANCE_FLOOR);
        assert!(normalizer.normalize(3.0).is_finite());
    }

    #[test]
    fn test_constant_returns_converge() {
        let mut normalizer = ReturnNormalizer::new(0.9);
        let batch = vec![4.0_f32; 16];

        for _ in 0..500 {
            normalizer.update(&batch);
        }

        assert!((normalizer.mean() - 4.0).abs() < 1e-6);
        assert_eq!(normalizer.var(), VARIANCE_FLOOR);
    }

    #[test]
    fn test_zero_weight_uses_latest_batch() {
        let mut normalizer = ReturnNormalizer::new(0.0);
        let batch = [1.0_f32, 2.0, 3.0, 6.0];
        normalizer.update(&batch);

        let batch_mean = 3.0;
        let batch_var = (4.0 + 1.0 + 0.0 + 9.0) / 4.0;

        assert!((normalizer.mean() - batch_mean).abs() < 1e-12);
        assert!((normalizer.var() - batch_var).abs() < 1e-12);

        for &r in &batch {
            let expected = (r as f64 - batch_mean) / f64::sqrt(batch_var);
            assert!((normalizer.normalize(r as f64) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_debiasing_corrects_zero_init() {
        let mut normalizer = ReturnNormalizer::new(0.5);
        normalizer.update(&[10.0]);

        // Raw accumulator is pulled halfway towards zero, the debiased mean is not
        let (running_mean, _, debias) = normalizer.accumulators();
        assert_eq!(running_mean, 5.0);
        assert_eq!(debias, 0.5);
        assert!((normalizer.mean() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let mut normalizer = ReturnNormalizer::new(0.9);
        normalizer.update(&[-3.0, 1.0, 7.5, 12.0]);
        normalizer.update(&[0.5, 2.0]);

        for x in [-100.0, -1.5, 0.0, 0.3, 42.0] {
            let back = normalizer.denormalize(normalizer.normalize(x));
            assert!((back - x).abs() < 1e-9, "{} != {}", back, x);
        }
    }

    #[test]
    fn test_slice_helpers_match_scalar() {
        let mut normalizer = ReturnNormalizer::new(0.0);
        normalizer.update(&[0.0, 4.0]);

        let mut values = vec![0.0_f32, 2.0, 4.0];
        normalizer.normalize_slice(&mut values);
        assert_eq!(values, vec![-1.0, 0.0, 1.0]);

        normalizer.denormalize_slice(&mut values);
        assert_eq!(values, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_empty_update_is_ignored() {
        let mut normalizer = ReturnNormalizer::new(0.9);
        normalizer.update(&[]);
        assert_eq!(normalizer.accumulators(), (0.0, 0.0, 0.0));
    }
}
