use super::traits::ConfigSection;
use crate::error::FilterOptError;
use serde::{Deserialize, Serialize};

/// Weights of the composite fitness score:
///
/// `score = return_weight * total_return - drawdown_weight * max_drawdown
///        - volatility_weight * annualized_volatility + sharpe_weight * sharpe
///        + tail_weight * p5_return`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub return_weight: f64,
    pub drawdown_weight: f64,
    pub volatility_weight: f64,
    pub sharpe_weight: f64,
    pub tail_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            return_weight: 1.0,
            drawdown_weight: 0.5,
            volatility_weight: 0.0,
            sharpe_weight: 0.0,
            tail_weight: 0.0,
        }
    }
}

impl ScoringWeights {
    fn all(&self) -> [f64; 5] {
        [
            self.return_weight,
            self.drawdown_weight,
            self.volatility_weight,
            self.sharpe_weight,
            self.tail_weight,
        ]
    }
}

impl ConfigSection for ScoringWeights {
    fn section_name() -> &'static str {
        "scoring"
    }

    fn validate(&self) -> Result<(), FilterOptError> {
        let weights = self.all();
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(FilterOptError::Configuration(
                "Scoring weights must be finite".to_string(),
            ));
        }
        if weights.iter().all(|w| *w == 0.0) {
            return Err(FilterOptError::Configuration(
                "At least one scoring weight must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
