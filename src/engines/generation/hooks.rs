use super::candidate::Candidate;
use super::fitness::Fitness;
use super::parameter_space::ParamValue;
use crate::error::{FilterOptError, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Best candidate of one generation, as handed to a checkpoint sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: u64,
    pub generation: usize,
    pub candidate: Candidate,
    pub parameters: BTreeMap<String, ParamValue>,
    pub fitness: Fitness,
    pub recorded_at: DateTime<Utc>,
}

/// Winning filter configuration of a converged run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergedFilter {
    pub run_id: u64,
    pub instrument: String,
    pub generations: usize,
    pub parameters: BTreeMap<String, ParamValue>,
    pub fitness: Fitness,
}

/// Storage for per-generation bests. Failures are logged by the engine and
/// never stop a run.
pub trait CheckpointSink: Send + Sync {
    fn record(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Pushes a converged configuration toward live strategies.
pub trait ConvergenceNotifier: Send + Sync {
    fn notify(&self, filter: &ConvergedFilter) -> Result<()>;
}

/// Appends one JSON object per line.
pub struct JsonlCheckpointSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlCheckpointSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl CheckpointSink for JsonlCheckpointSink {
    fn record(&self, checkpoint: &Checkpoint) -> Result<()> {
        let line = serde_json::to_string(checkpoint)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckpointSink {
    entries: Mutex<Vec<Checkpoint>>,
}

impl MemoryCheckpointSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Checkpoint> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CheckpointSink for MemoryCheckpointSink {
    fn record(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(checkpoint.clone());
        Ok(())
    }
}

pub struct ChannelNotifier {
    sender: Sender<ConvergedFilter>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<ConvergedFilter>) -> Self {
        Self { sender }
    }
}

impl ConvergenceNotifier for ChannelNotifier {
    fn notify(&self, filter: &ConvergedFilter) -> Result<()> {
        self.sender
            .send(filter.clone())
            .map_err(|_| FilterOptError::Generation("convergence receiver dropped".to_string()))
    }
}
