use chrono::{Duration, TimeZone, Utc};
use filteropt::config::AppConfig;
use filteropt::data::{CsvDataProvider, HistoricalDataProvider, WindowRequest};
use filteropt::engines::evaluation::FilterBacktester;
use filteropt::engines::generation::{FilterParameterSpace, ParameterDef, RunState};
use filteropt::services::OptimizationService;
use std::io::Write;
use std::sync::Arc;

/// Oscillating daily closes with a mild uptrend.
fn write_prices(dir: &std::path::Path, instrument: &str, days: i64) {
    let mut file = std::fs::File::create(dir.join(format!("{}.csv", instrument))).unwrap();
    writeln!(file, "Date,Open,Close,Volume").unwrap();
    let t0 = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
    for i in 0..days {
        let close = 100.0 + i as f64 * 0.05 + 8.0 * (i as f64 / 9.0).sin();
        writeln!(
            file,
            "{},{:.4},{:.4},{}",
            (t0 + Duration::days(i)).format("%Y-%m-%d"),
            close - 0.5,
            close,
            1000 + i
        )
        .unwrap();
    }
}

fn space() -> FilterParameterSpace {
    FilterParameterSpace::new(vec![
        ParameterDef::discrete("fast_period", vec![2.0, 3.0, 5.0, 8.0]),
        ParameterDef::discrete("slow_period", vec![10.0, 15.0, 20.0, 30.0]),
        ParameterDef::continuous("entry_threshold", 0.0, 0.02),
        ParameterDef::boolean("allow_short"),
    ])
    .unwrap()
}

#[test]
fn csv_window_loads_with_bounds() {
    let dir = tempfile::tempdir().unwrap();
    write_prices(dir.path(), "ACME", 120);
    let provider = CsvDataProvider::new(dir.path());

    let all = provider.load_window(&WindowRequest::new("ACME")).unwrap();
    assert_eq!(all.len(), 120);
    assert_eq!(all.instrument(), "ACME");

    let start = Utc.with_ymd_and_hms(2022, 2, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2022, 2, 28, 0, 0, 0).unwrap();
    let february = provider
        .load_window(&WindowRequest::new("ACME").between(start, end))
        .unwrap();
    assert_eq!(february.len(), 28);
    assert_eq!(february.start(), start);
}

#[test]
fn optimizes_crossover_filters_over_csv_history() {
    let dir = tempfile::tempdir().unwrap();
    write_prices(dir.path(), "ACME", 250);

    let mut config = AppConfig::default();
    config.optimization.population_size = 16;
    config.optimization.max_generations = 8;
    config.optimization.seed = 99;
    config.pool.worker_count = 2;

    let service = OptimizationService::new(
        Arc::new(CsvDataProvider::new(dir.path())),
        Arc::new(FilterBacktester::new(config.backtesting.clone())),
    );
    let handle = service
        .start_optimization(space(), WindowRequest::new("ACME"), config)
        .unwrap();
    let outcome = service.wait(&handle).unwrap();

    assert!(matches!(
        outcome.state,
        RunState::Converged | RunState::BudgetExhausted
    ));
    let best = outcome.best.unwrap();
    let stats = best.stats.unwrap();
    assert_eq!(stats.periods, 249);
    assert!(stats.trades.is_some());
    assert!(best.fitness.score.is_finite());
    assert!(outcome.hall_of_fame.len() <= 10);
}

#[test]
fn too_short_history_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_prices(dir.path(), "TINY", 8);

    let mut config = AppConfig::default();
    config.optimization.population_size = 6;
    config.pool.worker_count = 2;

    let service = OptimizationService::new(
        Arc::new(CsvDataProvider::new(dir.path())),
        Arc::new(FilterBacktester::new(config.backtesting.clone())),
    );
    let handle = service
        .start_optimization(space(), WindowRequest::new("TINY"), config)
        .unwrap();
    let outcome = service.wait(&handle).unwrap();

    // Every slow period needs more than eight bars.
    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.failure.unwrap().contains("Data gap"));
}
