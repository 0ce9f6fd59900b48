pub mod traits;
pub mod optimization;
pub mod pool;
pub mod scoring;
pub mod backtesting;
pub mod statistics;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use optimization::{OptimizationConfig, SelectionPolicy, CrossoverKind, StrategyKind};
pub use pool::{PoolConfig, Backpressure};
pub use scoring::ScoringWeights;
pub use backtesting::BacktestingConfig;
pub use statistics::StatisticsConfig;
pub use traits::ConfigSection;
