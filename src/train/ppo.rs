//! Proximal Policy Optimization with a centralized critic (MAPPO)
//!
//! Decentralized actors pick actions from their own observations while one
//! shared critic scores the global state. Both are trained with PPO's
//! clipped surrogate objective.
//!
//! # Algorithm Overview
//!
//! ```text
//! For each iteration:
//!   1. Anneal the learning rate
//!   2. Collect num_steps transitions for every agent slot
//!   3. Denormalize stored values, compute advantages using GAE
//!   4. For update_epochs epochs:
//!      a. Shuffle and split the batch into minibatches
//!      b. Update the return normalizer, build critic targets
//!      c. Clipped policy loss + clipped Huber value loss - entropy bonus
//!      d. Clip the gradient norm and step Adam
//!   5. Stop early if the last minibatch's KL exceeds target_kl
//! ```
//!
//! # References
//!
//! - [Proximal Policy Optimization Algorithms](https://arxiv.org/abs/1707.06347)
//! - [The Surprising Effectiveness of PPO in Cooperative Multi-Agent Games](https://arxiv.org/abs/2103.01955)

pub mod config;
pub mod loss;
pub mod stats;
pub mod trainer;

pub use config::{MappoConfig, RunLayout};
pub use loss::{
    PolicyLoss, ValueLossKind, compute_policy_loss, compute_value_loss, explained_variance,
    normalize_advantages,
};
pub use stats::TrainingStats;
pub use trainer::PPOTrainer;
