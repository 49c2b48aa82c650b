//! Training algorithms
//!
//! This module implements MAPPO training: the optimizer in [`ppo`], episode
//! bookkeeping, metric sinks, and the runner that drives iterations.

pub mod episode;
pub mod metrics;
pub mod ppo;
pub mod runner;

pub use episode::{EpisodeSummary, EpisodeTracker};
pub use metrics::{JsonlSink, MemorySink, MetricsSink, TracingSink};
pub use ppo::{MappoConfig, PPOTrainer, RunLayout, TrainingStats};
pub use runner::MappoRunner;
