use anyhow::{bail, Context};
use filteropt::config::ConfigManager;
use filteropt::data::{CsvConnector, HistoricalWindow};
use filteropt::engines::evaluation::FilterBacktester;
use filteropt::engines::generation::{
    FilterParameterSpace, LoggingProgressCallback, OptimizationEngine,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const USAGE: &str = "usage: filteropt <data.csv> <space.toml> [config.toml]";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        bail!(USAGE);
    }
    let data_path = PathBuf::from(&args[0]);
    let space_path = PathBuf::from(&args[1]);
    let config_path = args.get(2).map(PathBuf::from);

    let manager = ConfigManager::new();
    manager
        .load_layered(config_path.as_deref())
        .context("Failed to load configuration")?;
    let config = manager.get();

    let space_toml = std::fs::read_to_string(&space_path)
        .with_context(|| format!("Failed to read parameter space {}", space_path.display()))?;
    let space = Arc::new(
        FilterParameterSpace::from_toml_str(&space_toml)
            .with_context(|| format!("Invalid parameter space {}", space_path.display()))?,
    );

    let frame = CsvConnector::load_normalized(&data_path)
        .with_context(|| format!("Failed to load {}", data_path.display()))?;
    let window = HistoricalWindow::from_dataframe(instrument_name(&data_path), &frame)
        .with_context(|| format!("Invalid price history in {}", data_path.display()))?;

    let mut engine = OptimizationEngine::new(
        Arc::clone(&space),
        Arc::new(window),
        Arc::new(FilterBacktester::new(config.backtesting.clone())),
        &config,
        StdRng::seed_from_u64(config.optimization.seed),
    );
    let outcome = engine
        .run(&mut LoggingProgressCallback)
        .context("Optimization could not start")?;

    let report = serde_json::json!({
        "state": outcome.state,
        "generations": outcome.generations,
        "elapsed_secs": outcome.elapsed.as_secs_f64(),
        "failure": outcome.failure,
        "best": outcome.best.as_ref().map(|best| serde_json::json!({
            "parameters": best.candidate.named(&space),
            "fitness": best.fitness,
            "stats": best.stats,
        })),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn instrument_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}
