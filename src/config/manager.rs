use super::{
    backtesting::BacktestingConfig,
    optimization::OptimizationConfig,
    pool::PoolConfig,
    scoring::ScoringWeights,
    statistics::StatisticsConfig,
    traits::ConfigSection,
};
use crate::error::FilterOptError;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Environment variables override file values, e.g.
/// `FILTEROPT_POOL__WORKER_COUNT=8`.
pub const ENV_PREFIX: &str = "FILTEROPT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub optimization: OptimizationConfig,
    pub pool: PoolConfig,
    pub scoring: ScoringWeights,
    pub backtesting: BacktestingConfig,
    pub statistics: StatisticsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), FilterOptError> {
        self.optimization.validate()?;
        self.pool.validate()?;
        self.scoring.validate()?;
        self.backtesting.validate()?;
        self.statistics.validate()?;
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, FilterOptError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load an optional TOML file overlaid by `FILTEROPT_*` environment variables.
    pub fn load_layered(&self, path: Option<&Path>) -> Result<(), FilterOptError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        log::info!(
            "Loaded configuration{}",
            path.map(|p| format!(" from {}", p.display())).unwrap_or_default()
        );
        self.replace(config);
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FilterOptError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FilterOptError::Configuration(format!("Failed to read config: {}", e)))?;

        let config = AppConfig::from_toml_str(&contents)?;
        self.replace(config);
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FilterOptError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)?;

        std::fs::write(path, toml_str)
            .map_err(|e| FilterOptError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `f` to a copy and keep it only if it validates.
    pub fn update<F>(&self, f: F) -> Result<(), FilterOptError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get();
        f(&mut candidate);
        candidate.validate()?;
        self.replace(candidate);
        Ok(())
    }

    fn replace(&self, config: AppConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}
