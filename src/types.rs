use crate::error::{FilterOptError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
    EndOfData,
    Liquidation,
}

/// Closed trade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub direction: Direction,
    pub size: f64,
    pub profit: f64,
    pub exit_reason: ExitReason,
    pub fees: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.profit > 0.0
    }
}

/// One bar of historical data. A missing close marks a hole in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Time-ordered equity samples. Timestamps are strictly increasing and every
/// equity value is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    samples: Vec<EquitySample>,
}

impl EquityCurve {
    pub fn new(samples: Vec<EquitySample>) -> Result<Self> {
        for pair in samples.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(FilterOptError::InvalidCurve(format!(
                    "timestamps must be strictly increasing ({} followed by {})",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }
        if let Some(bad) = samples.iter().find(|s| !s.equity.is_finite()) {
            return Err(FilterOptError::InvalidCurve(format!(
                "non-finite equity at {}",
                bad.timestamp
            )));
        }
        Ok(Self { samples })
    }

    /// Build a curve from evenly spaced values.
    pub fn from_values(start: DateTime<Utc>, step: Duration, values: &[f64]) -> Result<Self> {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquitySample {
                timestamp: start + step * i as i32,
                equity,
            })
            .collect();
        Self::new(samples)
    }

    pub fn samples(&self) -> &[EquitySample] {
        &self.samples
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.equity).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&EquitySample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&EquitySample> {
        self.samples.last()
    }
}

/// Output of replaying one candidate over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backtest {
    pub equity_curve: EquityCurve,
    pub trades: Vec<Trade>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn curve_rejects_unordered_timestamps() {
        let t = start();
        let samples = vec![
            EquitySample { timestamp: t, equity: 100.0 },
            EquitySample { timestamp: t, equity: 101.0 },
        ];
        assert!(matches!(
            EquityCurve::new(samples),
            Err(FilterOptError::InvalidCurve(_))
        ));
    }

    #[test]
    fn curve_rejects_nan_equity() {
        let result = EquityCurve::from_values(start(), Duration::days(1), &[100.0, f64::NAN]);
        assert!(result.is_err());
    }

    #[test]
    fn from_values_spaces_samples() {
        let curve = EquityCurve::from_values(start(), Duration::hours(1), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(curve.len(), 3);
        assert_eq!(
            curve.samples()[2].timestamp - curve.samples()[0].timestamp,
            Duration::hours(2)
        );
        assert_eq!(curve.values(), vec![1.0, 2.0, 3.0]);
    }
}
