//! Train MAPPO on cooperative navigation (simple spread)
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin train_spread -- [config.json] [--metrics metrics.jsonl] [--agents N]
//! ```
//!
//! Without a config file every hyperparameter takes its default. Metric
//! scalars always go to `tracing` at debug level under the `metrics` target
//! and, with `--metrics`, to a JSON-lines file as well.

use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::{Context, Result, bail};
use thrust_mappo::prelude::*;
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<PathBuf>,
    metrics: Option<PathBuf>,
    agents: usize,
}

fn parse_args() -> Result<Args> {
    let mut args = Args { config: None, metrics: None, agents: 3 };
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--metrics" => {
                let path = iter.next().context("--metrics needs a path")?;
                args.metrics = Some(PathBuf::from(path));
            }
            "--agents" => {
                let n = iter.next().context("--agents needs a number")?;
                args.agents = n.parse().with_context(|| format!("invalid agent count: {}", n))?;
            }
            flag if flag.starts_with("--") => bail!("unknown flag: {}", flag),
            path => args.config = Some(PathBuf::from(path)),
        }
    }

    Ok(args)
}

/// Forwards every scalar to both sinks
struct Tee<A, B>(A, B);

impl<A: MetricsSink, B: MetricsSink> MetricsSink for Tee<A, B> {
    fn record_scalar(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        self.0.record_scalar(key, value, step)?;
        self.1.record_scalar(key, value, step)
    }

    fn flush(&mut self) -> Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => MappoConfig::from_json_file(path)?,
        None => MappoConfig::default(),
    };

    tracing::info!("Simple spread with {} agents", args.agents);
    tracing::info!("  Replicas: {}", config.num_envs);
    tracing::info!("  Steps per rollout: {}", config.num_steps);
    tracing::info!("  Total timesteps: {}", config.total_timesteps);
    tracing::info!("  Learning rate: {}", config.learning_rate);

    let agents = args.agents;
    let env = EnvPool::new(move || SimpleSpread::new(agents), config.num_envs)?;
    let mut runner = MappoRunner::new(config, env)?;

    match &args.metrics {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut sink = Tee(TracingSink, JsonlSink::new(BufWriter::new(file)));
            runner.train(&mut sink)?;
            tracing::info!("Metrics written to {}", path.display());
        }
        None => runner.train(&mut TracingSink)?,
    }

    tracing::info!(
        "Finished {} iterations ({} agent steps)",
        runner.iteration(),
        runner.global_step()
    );
    Ok(())
}
