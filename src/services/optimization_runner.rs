use crate::config::AppConfig;
use crate::data::{HistoricalDataProvider, WindowRequest};
use crate::engines::evaluation::Evaluator;
use crate::engines::generation::{
    CancellationToken, Candidate, CheckpointSink, ConvergenceNotifier, FilterParameterSpace,
    LoggingProgressCallback, OptimizationEngine, RunOutcome, RunState, RunStatus, StatusBoard,
};
use crate::error::{FilterOptError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Identifies a run started by an `OptimizationService`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunHandle {
    id: u64,
}

impl RunHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

struct RunEntry {
    status: StatusBoard,
    cancel: CancellationToken,
    join: Option<JoinHandle<Result<RunOutcome>>>,
}

/// Starts optimization runs on background threads and tracks them by handle.
pub struct OptimizationService {
    provider: Arc<dyn HistoricalDataProvider>,
    evaluator: Arc<dyn Evaluator>,
    checkpoint: Option<Arc<dyn CheckpointSink>>,
    notifier: Option<Arc<dyn ConvergenceNotifier>>,
    runs: Mutex<HashMap<u64, RunEntry>>,
    next_id: AtomicU64,
}

impl OptimizationService {
    pub fn new(provider: Arc<dyn HistoricalDataProvider>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            provider,
            evaluator,
            checkpoint: None,
            notifier: None,
            runs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_checkpoint_sink(mut self, sink: Arc<dyn CheckpointSink>) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ConvergenceNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate inputs, load the window and start the run. Returns as soon as
    /// the run thread is spawned.
    pub fn start_optimization(
        &self,
        space: FilterParameterSpace,
        request: WindowRequest,
        config: AppConfig,
    ) -> Result<RunHandle> {
        self.start_seeded(space, request, config, Vec::new())
    }

    /// Like `start_optimization`, with candidates placed first in the initial
    /// population.
    pub fn start_seeded(
        &self,
        space: FilterParameterSpace,
        request: WindowRequest,
        config: AppConfig,
        seeds: Vec<Candidate>,
    ) -> Result<RunHandle> {
        config.validate()?;
        for seed in &seeds {
            space.validate_candidate(seed)?;
        }

        let window = self.provider.load_window(&request)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let status = StatusBoard::new();
        let cancel = CancellationToken::new();

        let mut engine = OptimizationEngine::new(
            Arc::new(space),
            Arc::new(window),
            Arc::clone(&self.evaluator),
            &config,
            StdRng::seed_from_u64(config.optimization.seed),
        )
        .with_run_id(id)
        .with_seeds(seeds)
        .with_status_board(status.clone())
        .with_cancellation(cancel.clone());
        if let Some(sink) = &self.checkpoint {
            engine = engine.with_checkpoint_sink(Arc::clone(sink));
        }
        if let Some(notifier) = &self.notifier {
            engine = engine.with_notifier(Arc::clone(notifier));
        }

        let board = status.clone();
        let join = thread::Builder::new()
            .name(format!("filteropt-run-{}", id))
            .spawn(move || {
                panic::catch_unwind(AssertUnwindSafe(|| engine.run(&mut LoggingProgressCallback)))
                    .unwrap_or_else(|_| {
                        // Pollers must still see a terminal state.
                        let cause = format!("run {} panicked", id);
                        log::error!("Optimization {}", cause);
                        board.finish(RunState::Failed, Some(cause.clone()));
                        Err(FilterOptError::Generation(cause))
                    })
            })?;

        log::info!("Started optimization run {} on {}", id, request.instrument);
        self.lock_runs().insert(
            id,
            RunEntry {
                status,
                cancel,
                join: Some(join),
            },
        );
        Ok(RunHandle { id })
    }

    /// Last published snapshot of the run. Never blocks on the run itself.
    pub fn get_status(&self, handle: &RunHandle) -> Result<RunStatus> {
        self.with_entry(handle, |entry| entry.status.snapshot())
    }

    pub fn cancel(&self, handle: &RunHandle) -> Result<()> {
        self.with_entry(handle, |entry| {
            log::info!("Cancellation requested for run {}", handle.id);
            entry.cancel.cancel();
        })
    }

    pub fn is_finished(&self, handle: &RunHandle) -> Result<bool> {
        self.with_entry(handle, |entry| {
            entry.join.as_ref().map_or(true, |join| join.is_finished())
        })
    }

    /// Block until the run reaches a terminal state. A run can be waited on once.
    pub fn wait(&self, handle: &RunHandle) -> Result<RunOutcome> {
        let join = self
            .with_entry_mut(handle, |entry| entry.join.take())?
            .ok_or_else(|| {
                FilterOptError::Generation(format!("Run {} was already collected", handle.id))
            })?;

        join.join().map_err(|_| {
            FilterOptError::Generation(format!("Run {} thread panicked", handle.id))
        })?
    }

    fn lock_runs(&self) -> std::sync::MutexGuard<'_, HashMap<u64, RunEntry>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_entry<T>(&self, handle: &RunHandle, f: impl FnOnce(&RunEntry) -> T) -> Result<T> {
        let runs = self.lock_runs();
        runs.get(&handle.id)
            .map(f)
            .ok_or(FilterOptError::UnknownRun(handle.id))
    }

    fn with_entry_mut<T>(&self, handle: &RunHandle, f: impl FnOnce(&mut RunEntry) -> T) -> Result<T> {
        let mut runs = self.lock_runs();
        runs.get_mut(&handle.id)
            .map(f)
            .ok_or(FilterOptError::UnknownRun(handle.id))
    }
}

impl Drop for OptimizationService {
    fn drop(&mut self) {
        for entry in self.lock_runs().values() {
            entry.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataProvider;
    use crate::engines::evaluation::FilterBacktester;
    use crate::engines::generation::ParameterDef;
    use polars::prelude::*;

    fn service() -> OptimizationService {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let timestamps: Vec<i64> = (0..80).map(|i| 1_700_000_000_000 + i * 86_400_000).collect();
        let frame = df!("timestamp" => timestamps, "close" => closes).unwrap();
        let provider = InMemoryDataProvider::new().with_frame("TEST", frame);
        OptimizationService::new(
            Arc::new(provider),
            Arc::new(FilterBacktester::new(Default::default())),
        )
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let service = service();
        let handle = RunHandle { id: 99 };
        assert!(matches!(
            service.get_status(&handle),
            Err(FilterOptError::UnknownRun(99))
        ));
        assert!(matches!(service.cancel(&handle), Err(FilterOptError::UnknownRun(99))));
    }

    #[test]
    fn missing_instrument_fails_before_spawning() {
        let service = service();
        let space = FilterParameterSpace::new(vec![ParameterDef::discrete("fast_period", vec![3.0, 5.0])]).unwrap();
        let result = service.start_optimization(space, WindowRequest::new("NOPE"), AppConfig::default());
        assert!(result.is_err());
    }
}
