mod common;

use common::{config, grid_space, point, window, Bowl};
use chrono::{TimeZone, Utc};
use crossbeam_channel::unbounded;
use filteropt::config::{AppConfig, StrategyKind};
use filteropt::data::HistoricalWindow;
use filteropt::engines::evaluation::system::{FAST_PERIOD, SLOW_PERIOD};
use filteropt::engines::evaluation::FilterBacktester;
use filteropt::engines::generation::{
    CancellationToken, Candidate, ChannelNotifier, ChannelProgressCallback, FilterParameterSpace,
    GenerationRecord,
    MemoryCheckpointSink, NoProgress, OptimizationEngine, ParamValue, ParameterDef,
    ProgressCallback, ProgressMessage, RunComparator, RunOutcome, RunState,
};
use filteropt::types::Bar;
use filteropt::FilterOptError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn engine(evaluator: Arc<Bowl>, config: &AppConfig) -> OptimizationEngine {
    OptimizationEngine::new(
        Arc::new(grid_space()),
        Arc::new(window()),
        evaluator,
        config,
        StdRng::seed_from_u64(config.optimization.seed),
    )
}

fn run(config: &AppConfig) -> RunOutcome {
    engine(Arc::new(Bowl::new()), config).run(&mut NoProgress).unwrap()
}

#[test]
fn same_seed_reproduces_every_generation() {
    let config = config(7);
    let a = run(&config);
    let b = run(&config);

    assert_eq!(a.state, b.state);
    assert_eq!(a.generations, b.generations);
    assert_eq!(a.history, b.history);
    assert_eq!(
        a.best.as_ref().map(|e| e.candidate.clone()),
        b.best.as_ref().map(|e| e.candidate.clone())
    );
}

#[test]
fn different_seeds_explore_differently() {
    let a = run(&config(1));
    let b = run(&config(2));
    assert_ne!(a.history[0].population, b.history[0].population);
}

#[test]
fn recorded_best_never_decreases() {
    let outcome = run(&config(3));
    let bests: Vec<_> = outcome
        .history
        .iter()
        .map(|r| r.run_best_fitness.unwrap())
        .collect();

    for pair in bests.windows(2) {
        assert_ne!(RunComparator::compare(&pair[1], &pair[0]), Ordering::Less);
    }
    assert_eq!(outcome.best.unwrap().fitness, *bests.last().unwrap());
}

#[test]
fn generation_best_survives_into_next_generation() {
    let outcome = run(&config(5));
    assert!(outcome.history.len() > 1);

    for pair in outcome.history.windows(2) {
        let best = pair[0].best_candidate.as_ref().unwrap();
        assert!(
            pair[1].population.contains(best),
            "generation {} lost the best candidate {}",
            pair[1].generation,
            best
        );
    }
}

#[test]
fn small_grid_scenario_terminates_with_a_good_best() {
    let outcome = run(&config(42));

    assert!(outcome.generations <= 50);
    assert!(matches!(
        outcome.state,
        RunState::Converged | RunState::BudgetExhausted
    ));

    let best = outcome.best.unwrap();
    let first_generation_best = outcome.history[0].best_fitness.unwrap();
    assert_ne!(
        RunComparator::compare(&best.fitness, &first_generation_best),
        Ordering::Less
    );
    let x = best.candidate.values()[0].as_f64().unwrap();
    let y = best.candidate.values()[1].as_f64().unwrap();
    assert!((best.fitness.total_return - Bowl::expected_return(x, y)).abs() < 1e-9);

    // Hall of fame is sorted best first and holds distinct candidates.
    let hof = &outcome.hall_of_fame;
    assert!(!hof.is_empty());
    assert_eq!(hof[0].candidate, best.candidate);
    for pair in hof.windows(2) {
        assert_ne!(pair[0].candidate, pair[1].candidate);
        assert_ne!(RunComparator::compare(&pair[0].fitness, &pair[1].fitness), Ordering::Less);
    }
}

#[test]
fn population_is_capped_by_space_size() {
    let mut config = config(9);
    config.optimization.population_size = 500;
    config.optimization.elitism_count = 2;
    config.optimization.max_generations = 2;

    let outcome = run(&config);
    assert_eq!(outcome.history[0].population.len(), 100);
}

#[test]
fn timed_out_candidate_is_excluded_without_blocking() {
    let mut config = config(13);
    config.optimization.population_size = 8;
    config.optimization.max_generations = 1;
    config.pool.generation_timeout_ms = 150;

    struct Timing {
        completed: Vec<Instant>,
    }
    impl ProgressCallback for Timing {
        fn on_generation_start(&mut self, _generation: usize) {}
        fn on_generation_complete(&mut self, _record: &GenerationRecord) {
            self.completed.push(Instant::now());
        }
        fn on_candidate_evaluated(&mut self, _evaluated: usize, _total: usize) {}
    }

    let slow = point(0.0, 0.0);
    let evaluator = Arc::new(Bowl::slow_at(0.0, 0.0, Duration::from_millis(1500)));
    let mut timing = Timing { completed: Vec::new() };

    let started = Instant::now();
    let outcome = engine(evaluator, &config)
        .with_seeds(vec![slow.clone()])
        .run(&mut timing)
        .unwrap();

    assert_eq!(outcome.state, RunState::BudgetExhausted);
    let record = &outcome.history[0];
    assert_eq!(record.timed_out, 1);
    assert_eq!(record.evaluated, 7);
    assert!(record.population.contains(&slow));
    assert!(outcome.hall_of_fame.iter().all(|e| e.candidate != slow));

    // Ranking went ahead long before the slow evaluation finished.
    let completed_after = timing.completed[0].duration_since(started);
    assert!(completed_after < Duration::from_millis(1000), "{:?}", completed_after);
}

#[test]
fn generation_where_everything_fails_fails_the_run() {
    let evaluator = Arc::new(Bowl::failing());
    let mut engine = engine(evaluator, &config(17));
    let status = engine.status_board();

    let outcome = engine.run(&mut NoProgress).unwrap();

    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.history.is_empty());
    assert!(outcome.best.is_none());
    let cause = outcome.failure.unwrap();
    assert!(cause.contains("synthetic outage"), "{}", cause);

    let snapshot = status.snapshot();
    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(snapshot.failure.as_deref(), Some(cause.as_str()));
}

#[test]
fn simple_strategy_keeps_elite_and_improves() {
    let mut config = config(21);
    config.optimization.strategy = StrategyKind::Simple;

    let outcome = run(&config);
    assert!(outcome.generations >= 1);
    let best = outcome.best.unwrap();
    let first = outcome.history[0].best_fitness.unwrap();
    assert_ne!(RunComparator::compare(&best.fitness, &first), Ordering::Less);

    for pair in outcome.history.windows(2) {
        let elite = pair[0].best_candidate.as_ref().unwrap();
        assert!(pair[1].population.contains(elite));
    }
}

#[test]
fn cache_avoids_reevaluating_survivors() {
    let mut config = config(23);
    config.optimization.max_generations = 5;
    config.optimization.convergence_patience = 0;

    let evaluator = Arc::new(Bowl::new());
    let outcome = engine(Arc::clone(&evaluator), &config)
        .run(&mut NoProgress)
        .unwrap();

    assert_eq!(outcome.state, RunState::BudgetExhausted);
    assert_eq!(outcome.generations, 5);
    let evaluated: usize = outcome.history.iter().map(|r| r.evaluated).sum();
    let hits: usize = outcome.history.iter().map(|r| r.cache_hits).sum();
    assert!(hits > 0);
    assert_eq!(evaluator.calls() + hits, evaluated);
}

#[test]
fn cancelled_before_start_evaluates_nothing() {
    let evaluator = Arc::new(Bowl::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = engine(Arc::clone(&evaluator), &config(29))
        .with_cancellation(cancel)
        .run(&mut NoProgress)
        .unwrap();

    assert_eq!(outcome.state, RunState::Cancelled);
    assert_eq!(outcome.generations, 0);
    assert_eq!(evaluator.calls(), 0);
}

#[test]
fn checkpoints_and_convergence_notification() {
    let mut config = config(31);
    config.optimization.max_generations = 500;
    config.optimization.convergence_patience = 2;

    let sink = Arc::new(MemoryCheckpointSink::new());
    let (tx, rx) = unbounded();
    let outcome = engine(Arc::new(Bowl::new()), &config)
        .with_run_id(77)
        .with_checkpoint_sink(sink.clone())
        .with_notifier(Arc::new(ChannelNotifier::new(tx)))
        .run(&mut NoProgress)
        .unwrap();

    assert_eq!(outcome.state, RunState::Converged);

    let checkpoints = sink.entries();
    assert_eq!(checkpoints.len(), outcome.generations);
    assert!(checkpoints.iter().all(|c| c.run_id == 77));
    assert_eq!(checkpoints[0].generation, 1);

    let converged = rx.try_recv().unwrap();
    let best = outcome.best.unwrap();
    assert_eq!(converged.run_id, 77);
    assert_eq!(converged.instrument, "SYN");
    assert_eq!(converged.fitness, best.fitness);
    assert_eq!(converged.parameters.len(), 2);
    assert!(rx.try_recv().is_err());
}

#[test]
fn seed_outside_the_space_is_rejected() {
    let result = engine(Arc::new(Bowl::new()), &config(37))
        .with_seeds(vec![point(42.0, 0.0)])
        .run(&mut NoProgress);
    assert!(matches!(result, Err(FilterOptError::InvalidParameter { .. })));
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut config = config(41);
    config.optimization.population_size = 1;
    let result = engine(Arc::new(Bowl::new()), &config).run(&mut NoProgress);
    assert!(matches!(result, Err(FilterOptError::Configuration(_))));
}

#[test]
fn unusable_period_marks_candidate_unfit_and_run_continues() {
    let space = FilterParameterSpace::new(vec![
        ParameterDef::continuous(FAST_PERIOD, 0.0, 20.0),
        ParameterDef::discrete(SLOW_PERIOD, vec![30.0, 40.0]),
    ])
    .unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let bars = (0..120)
        .map(|i| Bar {
            timestamp: t0 + chrono::Duration::days(i),
            close: Some(100.0 + 10.0 * (i as f64 / 7.0).sin()),
        })
        .collect();
    let window = HistoricalWindow::new("SIN", bars).unwrap();

    let mut config = config(3);
    config.optimization.max_generations = 5;
    config.optimization.convergence_patience = 0;

    // fast_period 0 is inside the declared range but cannot drive an average.
    let zero_period = Candidate::new(vec![ParamValue::Number(0.0), ParamValue::Number(30.0)]);
    let outcome = OptimizationEngine::new(
        Arc::new(space),
        Arc::new(window),
        Arc::new(FilterBacktester::new(config.backtesting.clone())),
        &config,
        StdRng::seed_from_u64(3),
    )
    .with_seeds(vec![zero_period.clone()])
    .run(&mut NoProgress)
    .unwrap();

    assert_eq!(outcome.state, RunState::BudgetExhausted);
    assert_eq!(outcome.generations, 5);
    assert!(outcome.failure.is_none());
    assert!(outcome.history[0].population.contains(&zero_period));
    assert!(outcome.history[0].failed >= 1);
    assert_ne!(outcome.best.unwrap().candidate, zero_period);
}

#[test]
fn cancel_with_abandon_does_not_wait_for_running_evaluations() {
    let mut config = config(43);
    config.pool.abandon_in_flight_on_cancel = true;
    config.pool.generation_timeout_ms = 60_000;

    let evaluator = Arc::new(Bowl::slow_everywhere(Duration::from_secs(3)));
    let cancel = CancellationToken::new();
    let mut engine = engine(Arc::clone(&evaluator), &config).with_cancellation(cancel.clone());

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        cancel.cancel();
    });
    let started = Instant::now();
    let outcome = engine.run(&mut NoProgress).unwrap();
    let took = started.elapsed();
    canceller.join().unwrap();

    assert_eq!(outcome.state, RunState::Cancelled);
    assert!(took < Duration::from_millis(1500), "{:?}", took);
    // Only the tasks already running when the pool was abandoned ever start.
    assert!(evaluator.calls() <= config.pool.worker_count);
    std::thread::sleep(Duration::from_millis(100));
    assert!(evaluator.calls() <= config.pool.worker_count);
}

#[test]
fn channel_progress_streams_every_generation() {
    let mut config = config(47);
    config.optimization.max_generations = 2;
    config.optimization.convergence_patience = 0;

    let (tx, rx) = std::sync::mpsc::channel();
    let mut progress = ChannelProgressCallback::new(tx);
    let outcome = engine(Arc::new(Bowl::new()), &config)
        .run(&mut progress)
        .unwrap();
    drop(progress);
    let messages: Vec<ProgressMessage> = rx.iter().collect();

    assert!(matches!(messages.first(), Some(ProgressMessage::GenerationStart(1))));
    let completed: Vec<usize> = messages
        .iter()
        .filter_map(|m| match m {
            ProgressMessage::GenerationComplete(record) => Some(record.generation),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![1, 2]);

    let last_in_first_generation = messages
        .iter()
        .take_while(|m| !matches!(m, ProgressMessage::GenerationComplete(_)))
        .filter_map(|m| match m {
            ProgressMessage::CandidateEvaluated { evaluated, total } => Some((*evaluated, *total)),
            _ => None,
        })
        .last();
    let size = outcome.history[0].population.len();
    assert_eq!(last_in_first_generation, Some((size, size)));
}
