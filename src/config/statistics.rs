use super::traits::ConfigSection;
use crate::error::FilterOptError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Width of one return-histogram bucket, as a fraction (0.005 = 0.5%).
    pub bucket_width: f64,
    /// Sampling periods per year, used to annualize returns and volatility.
    pub periods_per_year: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            bucket_width: 0.005,
            periods_per_year: 252.0,
        }
    }
}

impl ConfigSection for StatisticsConfig {
    fn section_name() -> &'static str {
        "statistics"
    }

    fn validate(&self) -> Result<(), FilterOptError> {
        if !(self.bucket_width > 0.0) || !self.bucket_width.is_finite() {
            return Err(FilterOptError::Configuration(
                "Histogram bucket width must be a positive number".to_string(),
            ));
        }
        if !(self.periods_per_year > 0.0) || !self.periods_per_year.is_finite() {
            return Err(FilterOptError::Configuration(
                "Periods per year must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}
