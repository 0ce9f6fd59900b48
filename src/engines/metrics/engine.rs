// src/engines/metrics/engine.rs
use super::histogram::{Histogram, ReturnPercentiles};
use super::profitability::TradeStats;
use super::returns;
use super::risk::RiskMetrics;
use crate::config::StatisticsConfig;
use crate::error::{FilterOptError, Result};
use crate::types::{Backtest, EquityCurve};
use serde::{Deserialize, Serialize};

/// Summary of one equity curve. Computing it twice from the same curve gives
/// bit-identical values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub periods: usize,
    pub starting_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub histogram: Histogram,
    pub percentiles: ReturnPercentiles,
    pub trades: Option<TradeStats>,
}

/// Stateless summarizer; holds only bucket width and annualization settings.
#[derive(Debug, Clone, Default)]
pub struct StatisticsAggregator {
    config: StatisticsConfig,
}

impl StatisticsAggregator {
    pub fn new(config: StatisticsConfig) -> Self {
        Self { config }
    }

    /// A single-sample curve has no periods: zero volatility, zero return and
    /// every percentile 0.0.
    pub fn summarize(&self, curve: &EquityCurve) -> Result<PerformanceStats> {
        if curve.is_empty() {
            return Err(FilterOptError::EmptyCurve);
        }

        let equity = curve.values();
        let period_returns = returns::period_returns(&equity);
        let total_return = returns::total_return(&equity);
        let risk = RiskMetrics::calculate(&equity, &period_returns, self.config.periods_per_year);

        Ok(PerformanceStats {
            periods: period_returns.len(),
            starting_equity: equity[0],
            final_equity: equity[equity.len() - 1],
            total_return,
            annualized_return: returns::annualized_return(
                total_return,
                period_returns.len(),
                self.config.periods_per_year,
            ),
            max_drawdown: risk.max_drawdown,
            volatility: risk.volatility,
            annualized_volatility: risk.annualized_volatility,
            sharpe_ratio: risk.sharpe_ratio,
            sortino_ratio: risk.sortino_ratio,
            histogram: Histogram::build(&period_returns, self.config.bucket_width),
            percentiles: ReturnPercentiles::from_samples(&period_returns),
            trades: None,
        })
    }

    pub fn summarize_backtest(&self, backtest: &Backtest) -> Result<PerformanceStats> {
        let mut stats = self.summarize(&backtest.equity_curve)?;
        stats.trades = Some(TradeStats::calculate(&backtest.trades));
        Ok(stats)
    }
}
