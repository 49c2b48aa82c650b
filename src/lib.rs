//! # Thrust MAPPO
//!
//! Cooperative multi-agent PPO with a centralized critic, in Rust + tch-rs
//!
//! Decentralized actors act on their own observations; one shared critic
//! scores the global state of each environment replica. Training follows the
//! MAPPO recipe: GAE advantages, return normalization with a debiased moving
//! average, clipped policy and value objectives, and KL early stopping.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thrust_mappo::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = MappoConfig::new().num_envs(16).total_timesteps(1_000_000);
//! let env = EnvPool::new(|| SimpleSpread::new(3), config.num_envs)?;
//!
//! let mut runner = MappoRunner::new(config, env)?;
//! runner.train(&mut TracingSink)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Environment traits and implementations
pub mod env;

/// Actor-critic networks
pub mod policy;

/// Rollout storage, GAE and minibatch sampling
pub mod buffer;

/// MAPPO optimizer, runner and metrics
pub mod train;

/// Utility functions and helpers
pub mod utils;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        env::{MultiAgentEnvironment, VecEnv, pool::EnvPool, spread::SimpleSpread},
        policy::{Activation, ActorCritic, MlpConfig},
        train::{
            JsonlSink, MappoConfig, MappoRunner, MemorySink, MetricsSink, PPOTrainer, RunLayout,
            TracingSink, TrainingStats,
        },
        utils::ReturnNormalizer,
    };
}

/// Current version of thrust-mappo
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
