use super::traits::{check_unit_interval, ConfigSection};
use crate::error::FilterOptError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestingConfig {
    pub initial_capital: f64,
    /// Fraction of available cash committed to each new position.
    pub position_size: f64,
    pub commission: f64,
    pub slippage: f64,
    /// Equity level at which open positions are liquidated and trading stops.
    pub equity_floor: f64,
    /// Largest tolerated distance between consecutive bars, in seconds.
    pub max_gap_secs: Option<i64>,
}

impl Default for BacktestingConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10000.0,
            position_size: 0.1,
            commission: 0.001,
            slippage: 0.0005,
            equity_floor: 0.0,
            max_gap_secs: None,
        }
    }
}

impl ConfigSection for BacktestingConfig {
    fn section_name() -> &'static str {
        "backtesting"
    }

    fn validate(&self) -> Result<(), FilterOptError> {
        if !(self.initial_capital > 0.0) || !self.initial_capital.is_finite() {
            return Err(FilterOptError::Configuration(
                "Initial capital must be positive".to_string(),
            ));
        }
        if self.position_size <= 0.0 {
            return Err(FilterOptError::Configuration(
                "Position size must be positive".to_string(),
            ));
        }
        check_unit_interval(Self::section_name(), "position_size", self.position_size)?;
        check_unit_interval(Self::section_name(), "commission", self.commission)?;
        check_unit_interval(Self::section_name(), "slippage", self.slippage)?;
        if self.equity_floor < 0.0 || self.equity_floor >= self.initial_capital {
            return Err(FilterOptError::Configuration(
                "Equity floor must be in [0, initial_capital)".to_string(),
            ));
        }
        if matches!(self.max_gap_secs, Some(gap) if gap <= 0) {
            return Err(FilterOptError::Configuration(
                "Maximum bar gap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
