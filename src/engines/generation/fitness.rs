use crate::config::ScoringWeights;
use crate::engines::metrics::PerformanceStats;
use serde::{Deserialize, Serialize};

/// Score of one evaluated candidate plus the two tie-break components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fitness {
    pub score: f64,
    pub total_return: f64,
    /// Positive fraction; lower is better.
    pub max_drawdown: f64,
}

impl Fitness {
    /// Minimal fitness, assigned to candidates whose evaluation failed.
    /// Orders below every fitness computed from real statistics.
    pub fn unfit() -> Self {
        Self {
            score: f64::MIN,
            total_return: f64::MIN,
            max_drawdown: f64::MAX,
        }
    }

    pub fn is_unfit(&self) -> bool {
        self.score == f64::MIN
    }

    pub fn from_stats(stats: &PerformanceStats, weights: &ScoringWeights) -> Self {
        let score = weights.return_weight * stats.total_return
            - weights.drawdown_weight * stats.max_drawdown
            - weights.volatility_weight * stats.annualized_volatility
            + weights.sharpe_weight * stats.sharpe_ratio
            + weights.tail_weight * stats.percentiles.p5;

        if !score.is_finite() || !stats.total_return.is_finite() || !stats.max_drawdown.is_finite() {
            return Self::unfit();
        }

        // + 0.0 folds -0.0 into 0.0 so equal scores compare equal
        Self {
            score: score + 0.0,
            total_return: stats.total_return + 0.0,
            max_drawdown: stats.max_drawdown + 0.0,
        }
    }
}
