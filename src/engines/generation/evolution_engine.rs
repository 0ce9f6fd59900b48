use super::candidate::Candidate;
use super::comparator::RunComparator;
use super::diversity::population_diversity;
use super::fitness::Fitness;
use super::fitness_cache::FitnessCache;
use super::hall_of_fame::HallOfFame;
use super::hooks::{Checkpoint, CheckpointSink, ConvergedFilter, ConvergenceNotifier};
use super::parameter_space::FilterParameterSpace;
use super::population::{EvaluatedCandidate, Population};
use super::progress::ProgressCallback;
use super::status::{CancellationToken, RunState, StatusBoard};
use super::strategy::{ProposalInput, SearchStrategy};
use crate::config::AppConfig;
use crate::data::HistoricalWindow;
use crate::engines::evaluation::Evaluator;
use crate::engines::metrics::{PerformanceStats, StatisticsAggregator};
use crate::engines::pool::{PoolStats, TaskHandle, WorkerPool};
use crate::error::{FilterOptError, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest the engine blocks without re-checking cancellation.
const POLL_SLICE: Duration = Duration::from_millis(25);

/// What happened in one generation. Kept in the run outcome so two runs can
/// be compared generation by generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// 1-based.
    pub generation: usize,
    pub population: Vec<Candidate>,
    pub best_candidate: Option<Candidate>,
    pub best_fitness: Option<Fitness>,
    pub run_best_fitness: Option<Fitness>,
    pub diversity: f64,
    /// Candidates with a result, cached or fresh, fit or not.
    pub evaluated: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cache_hits: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: u64,
    pub state: RunState,
    pub generations: usize,
    pub best: Option<EvaluatedCandidate>,
    pub hall_of_fame: Vec<EvaluatedCandidate>,
    pub history: Vec<GenerationRecord>,
    pub failure: Option<String>,
    pub elapsed: Duration,
    pub pool_stats: PoolStats,
}

type TaskOutput = (Fitness, PerformanceStats);

enum Interrupt {
    Cancelled,
    Failed(FilterOptError),
}

enum Slot {
    Ready(EvaluatedCandidate),
    Pending {
        candidate: Candidate,
        discovery: u64,
        handle: TaskHandle<TaskOutput>,
    },
    TimedOut,
}

struct GenerationResults {
    evaluated: Vec<EvaluatedCandidate>,
    failed: usize,
    timed_out: usize,
    cache_hits: usize,
}

/// Drives one optimization run: initialize, then evaluate, rank and reproduce
/// until convergence, budget exhaustion, failure or cancellation.
///
/// The engine is the only owner of the population and the run's best; workers
/// get owned copies of candidates and send back new result values. All
/// randomness comes from the injected `StdRng`, so a fixed seed reproduces
/// every generation.
pub struct OptimizationEngine {
    run_id: u64,
    space: Arc<FilterParameterSpace>,
    window: Arc<HistoricalWindow>,
    evaluator: Arc<dyn Evaluator>,
    aggregator: Arc<StatisticsAggregator>,
    config: AppConfig,
    strategy: SearchStrategy,
    rng: StdRng,
    seeds: Vec<Candidate>,
    status: StatusBoard,
    cancel: CancellationToken,
    checkpoint: Option<Arc<dyn CheckpointSink>>,
    notifier: Option<Arc<dyn ConvergenceNotifier>>,
    cache: Option<FitnessCache>,
    hall_of_fame: HallOfFame,
    discovered: HashMap<Candidate, u64>,
}

impl OptimizationEngine {
    pub fn new(
        space: Arc<FilterParameterSpace>,
        window: Arc<HistoricalWindow>,
        evaluator: Arc<dyn Evaluator>,
        config: &AppConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            run_id: 0,
            space,
            window,
            evaluator,
            aggregator: Arc::new(StatisticsAggregator::new(config.statistics.clone())),
            strategy: SearchStrategy::from_config(&config.optimization),
            config: config.clone(),
            rng,
            seeds: Vec::new(),
            status: StatusBoard::new(),
            cancel: CancellationToken::new(),
            checkpoint: None,
            notifier: None,
            cache: None,
            hall_of_fame: HallOfFame::new(config.optimization.hall_of_fame_size),
            discovered: HashMap::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: u64) -> Self {
        self.run_id = run_id;
        self
    }

    /// Candidates placed first in the initial population.
    pub fn with_seeds(mut self, seeds: Vec<Candidate>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_status_board(mut self, status: StatusBoard) -> Self {
        self.status = status;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_checkpoint_sink(mut self, sink: Arc<dyn CheckpointSink>) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ConvergenceNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Population size actually used: never more than the number of distinct
    /// candidates the space holds.
    pub fn effective_population_size(&self) -> usize {
        let configured = self.config.optimization.population_size;
        match self.space.cardinality() {
            Some(card) if card < configured as u128 => card as usize,
            _ => configured,
        }
    }

    /// Run to a terminal state. Setup problems (invalid configuration, seeds
    /// outside the space, worker threads that cannot start) are returned as
    /// errors; everything after setup ends in a terminal `RunOutcome`.
    pub fn run(&mut self, progress: &mut dyn ProgressCallback) -> Result<RunOutcome> {
        self.config.validate()?;
        for seed in &self.seeds {
            self.space.validate_candidate(seed)?;
        }

        let started = Instant::now();
        let mut pool = WorkerPool::new(&self.config.pool)?;
        self.reset();
        self.status.set_state(RunState::Initializing);

        let opt = self.config.optimization.clone();
        let target = self.effective_population_size();
        log::info!(
            "Starting optimization run {} on {} ({} bars): {} parameters, space size {}, population {}, seed {}, {:?} strategy, {} workers",
            self.run_id,
            self.window.instrument(),
            self.window.len(),
            self.space.len(),
            self.space
                .cardinality()
                .map_or_else(|| "continuous".to_string(), |c| c.to_string()),
            target,
            opt.seed,
            opt.strategy,
            pool.worker_count()
        );

        let mut population = self.initial_population(target);
        let mut history: Vec<GenerationRecord> = Vec::new();
        let mut run_best: Option<EvaluatedCandidate> = None;
        let mut stale = 0usize;

        let (state, failure) = loop {
            let generation = history.len() + 1;
            if self.cancel.is_cancelled() {
                break (RunState::Cancelled, None);
            }

            self.status.set_state(RunState::Evaluating);
            log::debug!("Generation {} starting with {} candidates", generation, population.len());
            progress.on_generation_start(generation);

            let results = match self.evaluate_generation(&pool, &population, generation, progress) {
                Ok(results) => results,
                Err(Interrupt::Cancelled) => break (RunState::Cancelled, None),
                Err(Interrupt::Failed(e)) => {
                    break (RunState::Failed, Some(format!("generation {}: {}", generation, e)))
                }
            };

            self.status.set_state(RunState::Ranking);
            let mut ranked = results.evaluated;
            RunComparator::rank(&mut ranked);

            // Unfit candidates carry the minimal fitness and rank last.
            let fit_count = ranked.iter().take_while(|e| e.is_fit()).count();
            if fit_count == 0 {
                let cause = ranked
                    .iter()
                    .find_map(|e| e.failure.clone())
                    .unwrap_or_else(|| {
                        if results.timed_out > 0 {
                            "every evaluation timed out".to_string()
                        } else {
                            "no candidate produced a finite fitness".to_string()
                        }
                    });
                break (
                    RunState::Failed,
                    Some(format!(
                        "generation {}: all {} candidates failed; first cause: {}",
                        generation,
                        population.len(),
                        cause
                    )),
                );
            }
            let ranked_fit = &ranked[..fit_count];
            let generation_best = &ranked_fit[0];

            let incumbent = run_best.as_ref().map(|b| &b.fitness);
            let improved =
                RunComparator::improves(&generation_best.fitness, incumbent, opt.convergence_epsilon);
            if RunComparator::replaces(&generation_best.fitness, incumbent) {
                run_best = Some(generation_best.clone());
            }
            stale = if improved { 0 } else { stale + 1 };

            for entry in ranked_fit {
                self.hall_of_fame.try_add(entry);
            }

            let diversity = population_diversity(&self.space, population.members());
            self.status.publish_generation(
                generation,
                run_best.as_ref().map(|b| (&b.candidate, &b.fitness)),
            );
            self.record_checkpoint(generation, generation_best);

            let record = GenerationRecord {
                generation,
                population: population.members().to_vec(),
                best_candidate: Some(generation_best.candidate.unscored()),
                best_fitness: Some(generation_best.fitness),
                run_best_fitness: run_best.as_ref().map(|b| b.fitness),
                diversity,
                evaluated: ranked.len(),
                failed: results.failed,
                timed_out: results.timed_out,
                cache_hits: results.cache_hits,
            };
            log::debug!(
                "Generation {} complete: best score {:.6}, diversity {:.3}, {} evaluated, {} failed, {} timed out",
                generation,
                generation_best.fitness.score,
                diversity,
                record.evaluated,
                record.failed,
                record.timed_out
            );
            progress.on_generation_complete(&record);
            history.push(record);

            if opt.convergence_patience > 0 && stale >= opt.convergence_patience {
                log::info!(
                    "No improvement above {} for {} generations",
                    opt.convergence_epsilon,
                    stale
                );
                break (RunState::Converged, None);
            }
            if opt.min_diversity > 0.0 && diversity < opt.min_diversity {
                log::info!("Population diversity {:.4} fell below {}", diversity, opt.min_diversity);
                break (RunState::Converged, None);
            }
            if generation >= opt.max_generations {
                break (RunState::BudgetExhausted, None);
            }
            if opt.max_duration().is_some_and(|budget| started.elapsed() >= budget) {
                log::info!("Wall-clock budget exhausted after {:?}", started.elapsed());
                break (RunState::BudgetExhausted, None);
            }
            if self.cancel.is_cancelled() {
                break (RunState::Cancelled, None);
            }

            self.status.set_state(RunState::Reproducing);
            let elites = Self::select_elites(ranked_fit, run_best.as_ref(), opt.elitism_count);
            let input = ProposalInput {
                space: &self.space,
                current: &population,
                ranked: ranked_fit,
                elites: &elites,
                target_size: target,
                max_refill_attempts: opt.max_refill_attempts,
            };
            population = self.strategy.propose_next_population(&input, &mut self.rng);
        };

        // Observers see the terminal state before workers are joined.
        self.status.finish(state, failure.clone());
        if state == RunState::Cancelled && self.config.pool.abandon_in_flight_on_cancel {
            pool.abandon();
        } else {
            pool.shutdown();
        }
        let pool_stats = pool.stats();

        Ok(self.finish(pool_stats, state, failure, run_best, history, started))
    }

    fn reset(&mut self) {
        self.cache = self.config.optimization.cache_fitness.then(FitnessCache::new);
        self.hall_of_fame = HallOfFame::new(self.config.optimization.hall_of_fame_size);
        self.discovered.clear();
    }

    fn initial_population(&mut self, target: usize) -> Population {
        let mut population = Population::with_capacity(target);
        for seed in &self.seeds {
            if population.len() >= target {
                break;
            }
            population.push_unique(seed.unscored());
        }

        let budget = target.saturating_mul(self.config.optimization.max_refill_attempts.max(1));
        let mut attempts = 0usize;
        while population.len() < target && attempts < budget {
            attempts += 1;
            population.push_unique(self.space.sample(&mut self.rng));
        }
        population
    }

    /// Run best first, then the top of this generation, without duplicates.
    fn select_elites(
        ranked_fit: &[EvaluatedCandidate],
        run_best: Option<&EvaluatedCandidate>,
        elitism_count: usize,
    ) -> Vec<Candidate> {
        let mut elites = Population::new();
        if let Some(best) = run_best {
            elites.push_unique(best.candidate.unscored());
        }
        for entry in ranked_fit.iter().take(elitism_count) {
            elites.push_unique(entry.candidate.unscored());
        }
        elites.into_vec()
    }

    fn discovery_of(&mut self, candidate: &Candidate) -> u64 {
        let next = self.discovered.len() as u64;
        *self.discovered.entry(candidate.unscored()).or_insert(next)
    }

    fn make_task(
        &self,
        candidate: &Candidate,
        expired: &Arc<AtomicBool>,
    ) -> impl FnOnce() -> Result<TaskOutput> + Send + 'static {
        let candidate = candidate.unscored();
        let space = Arc::clone(&self.space);
        let window = Arc::clone(&self.window);
        let evaluator = Arc::clone(&self.evaluator);
        let aggregator = Arc::clone(&self.aggregator);
        let weights = self.config.scoring.clone();
        let expired = Arc::clone(expired);
        let timeout = self.config.pool.generation_timeout();

        move || {
            // Left in the queue past its generation's deadline.
            if expired.load(Ordering::Acquire) {
                return Err(FilterOptError::EvaluationTimeout(timeout));
            }
            let backtest = evaluator.evaluate(&candidate, &space, &window)?;
            let stats = aggregator.summarize_backtest(&backtest)?;
            Ok((Fitness::from_stats(&stats, &weights), stats))
        }
    }

    fn evaluate_generation(
        &mut self,
        pool: &WorkerPool,
        population: &Population,
        generation: usize,
        progress: &mut dyn ProgressCallback,
    ) -> std::result::Result<GenerationResults, Interrupt> {
        let expired = Arc::new(AtomicBool::new(false));
        let outcome = self.dispatch_and_collect(pool, population, generation, &expired, progress);
        expired.store(true, Ordering::Release);
        outcome
    }

    fn dispatch_and_collect(
        &mut self,
        pool: &WorkerPool,
        population: &Population,
        generation: usize,
        expired: &Arc<AtomicBool>,
        progress: &mut dyn ProgressCallback,
    ) -> std::result::Result<GenerationResults, Interrupt> {
        let timeout = self.config.pool.generation_timeout();
        let deadline = Instant::now() + timeout;
        let total = population.len();
        let mut slots: Vec<Slot> = Vec::with_capacity(total);
        let mut resolved = 0usize;
        let mut cache_hits = 0usize;

        for candidate in population.iter() {
            let discovery = self.discovery_of(candidate);

            if let Some(hit) = self.cache.as_mut().and_then(|c| c.lookup(candidate)) {
                cache_hits += 1;
                resolved += 1;
                progress.on_candidate_evaluated(resolved, total);
                slots.push(Slot::Ready(hit));
                continue;
            }

            let slot = loop {
                if self.cancel.is_cancelled() {
                    return Err(Interrupt::Cancelled);
                }
                let now = Instant::now();
                if now >= deadline {
                    break Slot::TimedOut;
                }
                let slice_end = (now + POLL_SLICE).min(deadline);
                match pool.submit_until(self.make_task(candidate, expired), slice_end) {
                    Ok(handle) => {
                        break Slot::Pending {
                            candidate: candidate.unscored(),
                            discovery,
                            handle,
                        }
                    }
                    Err(FilterOptError::QueueFull(_)) => {
                        // Make room by collecting the oldest outstanding result.
                        match slots.iter().position(|s| matches!(s, Slot::Pending { .. })) {
                            Some(oldest) => {
                                if poll_slot(&mut slots[oldest], slice_end, generation)? {
                                    resolved += 1;
                                    progress.on_candidate_evaluated(resolved, total);
                                }
                            }
                            None => std::thread::sleep(slice_end.saturating_duration_since(Instant::now())),
                        }
                    }
                    Err(e) => return Err(Interrupt::Failed(e)),
                }
            };
            if matches!(slot, Slot::TimedOut) {
                log::warn!(
                    "Candidate {} could not be submitted before the generation {} deadline ({:?}); excluded",
                    candidate,
                    generation,
                    timeout
                );
            }
            slots.push(slot);
        }

        for idx in 0..slots.len() {
            while matches!(slots[idx], Slot::Pending { .. }) {
                if self.cancel.is_cancelled() {
                    return Err(Interrupt::Cancelled);
                }
                let now = Instant::now();
                if now >= deadline {
                    if let Slot::Pending { candidate, .. } = &slots[idx] {
                        log::warn!(
                            "Candidate {} timed out after {:?} in generation {}; excluded from ranking",
                            candidate,
                            timeout,
                            generation
                        );
                    }
                    slots[idx] = Slot::TimedOut;
                    break;
                }
                if poll_slot(&mut slots[idx], (now + POLL_SLICE).min(deadline), generation)? {
                    resolved += 1;
                    progress.on_candidate_evaluated(resolved, total);
                }
            }
        }

        let mut results = GenerationResults {
            evaluated: Vec::with_capacity(total),
            failed: 0,
            timed_out: 0,
            cache_hits,
        };
        for slot in slots {
            match slot {
                Slot::Ready(entry) => {
                    if !entry.is_fit() {
                        results.failed += 1;
                    }
                    if let Some(cache) = self.cache.as_mut() {
                        cache.insert(&entry);
                    }
                    results.evaluated.push(entry);
                }
                // Nothing is left pending once the loop above finishes.
                Slot::TimedOut | Slot::Pending { .. } => results.timed_out += 1,
            }
        }
        Ok(results)
    }

    fn record_checkpoint(&self, generation: usize, best: &EvaluatedCandidate) {
        let Some(sink) = self.checkpoint.as_ref() else {
            return;
        };
        let checkpoint = Checkpoint {
            run_id: self.run_id,
            generation,
            candidate: best.candidate.unscored(),
            parameters: best.candidate.named(&self.space),
            fitness: best.fitness,
            recorded_at: Utc::now(),
        };
        if let Err(e) = sink.record(&checkpoint) {
            log::warn!("Checkpoint for generation {} failed: {}", generation, e);
        }
    }

    fn finish(
        &mut self,
        pool_stats: PoolStats,
        state: RunState,
        failure: Option<String>,
        best: Option<EvaluatedCandidate>,
        history: Vec<GenerationRecord>,
        started: Instant,
    ) -> RunOutcome {
        let generations = history.len();
        match (&state, &failure) {
            (RunState::Failed, Some(cause)) => {
                log::warn!("Optimization run {} failed: {}", self.run_id, cause)
            }
            _ => log::info!(
                "Optimization run {} finished: {:?} after {} generations, best score {}",
                self.run_id,
                state,
                generations,
                best.as_ref()
                    .map_or_else(|| "n/a".to_string(), |b| format!("{:.6}", b.fitness.score))
            ),
        }

        if state == RunState::Converged {
            if let (Some(notifier), Some(best)) = (self.notifier.as_ref(), best.as_ref()) {
                let filter = ConvergedFilter {
                    run_id: self.run_id,
                    instrument: self.window.instrument().to_string(),
                    generations,
                    parameters: best.candidate.named(&self.space),
                    fitness: best.fitness,
                };
                if let Err(e) = notifier.notify(&filter) {
                    log::warn!("Convergence notification for run {} failed: {}", self.run_id, e);
                }
            }
        }

        RunOutcome {
            run_id: self.run_id,
            state,
            generations,
            best,
            hall_of_fame: self.hall_of_fame.get_all().to_vec(),
            history,
            failure,
            elapsed: started.elapsed(),
            pool_stats,
        }
    }
}

/// Wait on a pending slot until `until`. Returns true if it resolved.
fn poll_slot(slot: &mut Slot, until: Instant, generation: usize) -> std::result::Result<bool, Interrupt> {
    let Slot::Pending { handle, .. } = slot else {
        return Ok(false);
    };
    let Some(outcome) = handle.wait_deadline(until) else {
        return Ok(false);
    };
    let Slot::Pending {
        candidate, discovery, ..
    } = std::mem::replace(slot, Slot::TimedOut)
    else {
        return Ok(false);
    };

    *slot = match outcome {
        Ok((fitness, stats)) => Slot::Ready(EvaluatedCandidate {
            candidate,
            fitness,
            discovery,
            stats: Some(stats),
            failure: None,
        }),
        Err(FilterOptError::EvaluationTimeout(after)) => {
            log::warn!(
                "Candidate {} timed out after {:?} in generation {}; excluded from ranking",
                candidate,
                after,
                generation
            );
            Slot::TimedOut
        }
        Err(e) if e.is_candidate_local() => {
            log::debug!("Candidate {} marked unfit: {}", candidate, e);
            Slot::Ready(EvaluatedCandidate {
                candidate,
                fitness: Fitness::unfit(),
                discovery,
                stats: None,
                failure: Some(e.to_string()),
            })
        }
        Err(e) => return Err(Interrupt::Failed(e)),
    };
    Ok(true)
}
