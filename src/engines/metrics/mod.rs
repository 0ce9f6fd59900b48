pub mod engine;
pub mod histogram;
pub mod profitability;
pub mod returns;
pub mod risk;

pub use engine::{PerformanceStats, StatisticsAggregator};
pub use histogram::{percentile, Histogram, HistogramBucket, ReturnPercentiles};
pub use profitability::TradeStats;
pub use risk::RiskMetrics;
