#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use filteropt::config::AppConfig;
use filteropt::data::HistoricalWindow;
use filteropt::engines::evaluation::Evaluator;
use filteropt::engines::generation::{Candidate, FilterParameterSpace, ParamValue, ParameterDef};
use filteropt::types::{Backtest, Bar, EquityCurve};
use filteropt::{FilterOptError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Two parameters over 0..=9 each: 100 candidates.
pub fn grid_space() -> FilterParameterSpace {
    let values: Vec<f64> = (0..10).map(f64::from).collect();
    FilterParameterSpace::new(vec![
        ParameterDef::discrete("x", values.clone()),
        ParameterDef::discrete("y", values),
    ])
    .unwrap()
}

pub fn point(x: f64, y: f64) -> Candidate {
    Candidate::new(vec![ParamValue::Number(x), ParamValue::Number(y)])
}

pub fn window() -> HistoricalWindow {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let bars = (0..5)
        .map(|i| Bar {
            timestamp: t0 + Duration::days(i),
            close: Some(100.0 + i as f64),
        })
        .collect();
    HistoricalWindow::new("SYN", bars).unwrap()
}

pub fn config(seed: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.optimization.population_size = 20;
    config.optimization.max_generations = 50;
    config.optimization.convergence_patience = 5;
    config.optimization.convergence_epsilon = 0.0;
    config.optimization.seed = seed;
    config.pool.worker_count = 4;
    config.pool.queue_capacity = 8;
    config
}

/// Single-peak landscape: total return is 1.0 at (7, 3) and falls off
/// quadratically, never below 0.15. Drawdown is always zero, so with default
/// weights the score equals the return.
pub struct Bowl {
    pub slow_point: Option<(f64, f64)>,
    pub delay: std::time::Duration,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl Bowl {
    pub fn new() -> Self {
        Self {
            slow_point: None,
            delay: std::time::Duration::ZERO,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow_at(x: f64, y: f64, delay: std::time::Duration) -> Self {
        Self {
            slow_point: Some((x, y)),
            delay,
            ..Self::new()
        }
    }

    pub fn slow_everywhere(delay: std::time::Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn expected_return(x: f64, y: f64) -> f64 {
        (100.0 - (x - 7.0).powi(2) - (y - 3.0).powi(2)) / 100.0
    }
}

impl Evaluator for Bowl {
    fn evaluate(
        &self,
        candidate: &Candidate,
        space: &FilterParameterSpace,
        window: &HistoricalWindow,
    ) -> Result<Backtest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FilterOptError::DataGap("synthetic outage".to_string()));
        }

        let coord = |name: &str| space.value_of(candidate, name).and_then(|v| v.as_f64()).unwrap_or(0.0);
        let (x, y) = (coord("x"), coord("y"));

        let slow = match self.slow_point {
            Some(p) => p == (x, y),
            None => !self.delay.is_zero(),
        };
        if slow {
            std::thread::sleep(self.delay);
        }

        let r = Self::expected_return(x, y);
        let curve = EquityCurve::from_values(window.start(), Duration::days(1), &[100.0, 100.0 * (1.0 + r)])?;
        Ok(Backtest {
            equity_curve: curve,
            trades: Vec::new(),
        })
    }
}
