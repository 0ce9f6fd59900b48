// src/engines/metrics/risk.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Largest peak-to-trough decline as a positive fraction of the peak.
    pub max_drawdown: f64,
    /// Population standard deviation of period returns.
    pub volatility: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
}

impl RiskMetrics {
    pub fn calculate(equity: &[f64], returns: &[f64], periods_per_year: f64) -> Self {
        let max_drawdown = Self::max_drawdown(equity);
        if returns.is_empty() {
            return Self {
                max_drawdown,
                ..Self::default()
            };
        }

        let volatility = Self::std_dev(returns);
        let annualized_volatility = volatility * periods_per_year.sqrt();

        // Risk-free rate is taken as zero.
        let avg_return = mean(returns);
        let sharpe_ratio = if volatility > 0.0 {
            avg_return / volatility * periods_per_year.sqrt()
        } else {
            0.0
        };

        let downside_dev = Self::downside_deviation(returns);
        let sortino_ratio = if downside_dev > 0.0 {
            avg_return / downside_dev * periods_per_year.sqrt()
        } else {
            0.0
        };

        Self {
            max_drawdown,
            volatility,
            annualized_volatility,
            sharpe_ratio,
            sortino_ratio,
        }
    }

    pub fn max_drawdown(equity: &[f64]) -> f64 {
        let Some(&first) = equity.first() else {
            return 0.0;
        };

        let mut max_dd: f64 = 0.0;
        let mut peak = first;
        for &value in equity {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                max_dd = max_dd.max((peak - value) / peak);
            }
        }
        max_dd
    }

    pub fn std_dev(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }

        let m = mean(values);
        let variance = values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
        variance.sqrt()
    }

    /// Root mean square of the negative part of each return.
    fn downside_deviation(returns: &[f64]) -> f64 {
        let sum_sq: f64 = returns.iter().map(|&r| r.min(0.0).powi(2)).sum();
        (sum_sq / returns.len() as f64).sqrt()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
