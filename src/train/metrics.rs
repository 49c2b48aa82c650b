//! Metric sinks for training diagnostics
//!
//! The runner reports every diagnostic as a named scalar keyed by the global
//! environment step. Sinks decide where those scalars go.

use std::{collections::BTreeSet, io::Write};

use anyhow::Result;
use serde::Serialize;

/// Destination for named scalar metrics
pub trait MetricsSink {
    /// Record `value` under `key` at global step `step`
    fn record_scalar(&mut self, key: &str, value: f64, step: u64) -> Result<()>;

    /// Flush any buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Emits every scalar as a `tracing` debug event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record_scalar(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        tracing::debug!(target: "metrics", key, value, step);
        Ok(())
    }
}

#[derive(Serialize)]
struct ScalarRecord<'a> {
    key: &'a str,
    value: f64,
    step: u64,
}

/// Writes one JSON object per scalar, one per line
///
/// Non-finite values are written as `null`.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    /// Write records to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricsSink for JsonlSink<W> {
    fn record_scalar(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &ScalarRecord { key, value, step })?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every scalar in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Vec<(String, f64, u64)>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in arrival order
    pub fn records(&self) -> &[(String, f64, u64)] {
        &self.records
    }

    /// `(step, value)` pairs recorded under `key`
    pub fn series(&self, key: &str) -> Vec<(u64, f64)> {
        self.records.iter().filter(|(k, _, _)| k == key).map(|&(_, v, s)| (s, v)).collect()
    }

    /// Distinct keys seen so far
    pub fn keys(&self) -> BTreeSet<&str> {
        self.records.iter().map(|(k, _, _)| k.as_str()).collect()
    }
}

impl MetricsSink for MemorySink {
    fn record_scalar(&mut self, key: &str, value: f64, step: u64) -> Result<()> {
        self.records.push((key.to_string(), value, step));
        Ok(())
    }
}
