use super::evaluator::Evaluator;
use super::portfolio::Portfolio;
use crate::config::BacktestingConfig;
use crate::data::HistoricalWindow;
use crate::engines::generation::{Candidate, FilterParameterSpace, ParamValue};
use crate::error::{FilterOptError, Result};
use crate::types::{Backtest, Direction, EquityCurve, EquitySample, ExitReason};
use chrono::Duration;

pub const FAST_PERIOD: &str = "fast_period";
pub const SLOW_PERIOD: &str = "slow_period";
pub const ENTRY_THRESHOLD: &str = "entry_threshold";
pub const STOP_LOSS_PCT: &str = "stop_loss_pct";
pub const TAKE_PROFIT_PCT: &str = "take_profit_pct";
pub const ALLOW_SHORT: &str = "allow_short";

/// Filters of the moving-average crossover system.
///
/// | parameter         | default | meaning                                          |
/// |-------------------|---------|--------------------------------------------------|
/// | `fast_period`     | 10      | bars in the fast average (rounded)               |
/// | `slow_period`     | 30      | bars in the slow average (rounded)               |
/// | `entry_threshold` | 0.0     | fast must clear slow by this fraction to enter   |
/// | `stop_loss_pct`   | off     | close when the open return falls to `-pct`       |
/// | `take_profit_pct` | off     | close when the open return reaches `pct`         |
/// | `allow_short`     | false   | enter short on the mirrored condition            |
///
/// Parameters the space does not declare take their default; parameters the
/// system does not know are ignored. In-domain values the system cannot use
/// (a period below 1, a negative threshold) are `UnusableParameter`. If `fast_period > slow_period` the two
/// are swapped, and equal periods never cross, so the system stays flat.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub entry_threshold: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub allow_short: bool,
}

impl Default for SystemParams {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
            entry_threshold: 0.0,
            stop_loss_pct: None,
            take_profit_pct: None,
            allow_short: false,
        }
    }
}

impl SystemParams {
    pub fn from_candidate(candidate: &Candidate, space: &FilterParameterSpace) -> Result<Self> {
        let defaults = Self::default();
        let number = |name: &str| -> Result<Option<f64>> {
            match space.value_of(candidate, name) {
                None => Ok(None),
                Some(ParamValue::Number(v)) => Ok(Some(*v)),
                Some(ParamValue::Bool(_)) => Err(FilterOptError::unusable_parameter(
                    name,
                    "expected a number, found a boolean",
                )),
            }
        };
        let period = |name: &str, default: usize| -> Result<usize> {
            match number(name)? {
                None => Ok(default),
                Some(v) if v.is_finite() && v.round() >= 1.0 => Ok(v.round() as usize),
                Some(v) => Err(FilterOptError::unusable_parameter(
                    name,
                    format!("period must be at least 1, got {}", v),
                )),
            }
        };
        let enabled_pct = |v: Option<f64>| v.filter(|p| *p > 0.0);

        let fast = period(FAST_PERIOD, defaults.fast_period)?;
        let slow = period(SLOW_PERIOD, defaults.slow_period)?;

        let entry_threshold = number(ENTRY_THRESHOLD)?.unwrap_or(defaults.entry_threshold);
        if entry_threshold < 0.0 {
            return Err(FilterOptError::unusable_parameter(
                ENTRY_THRESHOLD,
                "threshold must not be negative",
            ));
        }

        let allow_short = match space.value_of(candidate, ALLOW_SHORT) {
            None => defaults.allow_short,
            Some(ParamValue::Bool(b)) => *b,
            Some(ParamValue::Number(v)) => *v != 0.0,
        };

        Ok(Self {
            fast_period: fast.min(slow),
            slow_period: fast.max(slow),
            entry_threshold,
            stop_loss_pct: enabled_pct(number(STOP_LOSS_PCT)?),
            take_profit_pct: enabled_pct(number(TAKE_PROFIT_PCT)?),
            allow_short,
        })
    }

    /// Bars needed before the first signal, plus one bar to act on it.
    pub fn warmup(&self) -> usize {
        self.slow_period + 1
    }

    fn entry_signal(&self, fast: f64, slow: f64) -> Option<Direction> {
        if fast > slow * (1.0 + self.entry_threshold) {
            Some(Direction::Long)
        } else if self.allow_short && fast < slow * (1.0 - self.entry_threshold) {
            Some(Direction::Short)
        } else {
            None
        }
    }

    fn exit_signal(&self, direction: Direction, fast: f64, slow: f64) -> bool {
        match direction {
            Direction::Long => fast <= slow,
            Direction::Short => fast >= slow,
        }
    }

    fn risk_exit(&self, open_return: f64) -> Option<ExitReason> {
        if matches!(self.stop_loss_pct, Some(sl) if open_return <= -sl) {
            Some(ExitReason::StopLoss)
        } else if matches!(self.take_profit_pct, Some(tp) if open_return >= tp) {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

/// Moving-average crossover replay used as the default evaluator.
pub struct FilterBacktester {
    config: BacktestingConfig,
}

impl FilterBacktester {
    pub fn new(config: BacktestingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestingConfig {
        &self.config
    }

    fn check_window(&self, params: &SystemParams, window: &HistoricalWindow) -> Result<Vec<f64>> {
        if window.len() < params.warmup() {
            return Err(FilterOptError::DataGap(format!(
                "window has {} bars, system needs {} for slow_period {}",
                window.len(),
                params.warmup(),
                params.slow_period
            )));
        }

        if let (Some(max_gap), Some((bar, gap))) = (self.config.max_gap_secs, window.largest_gap()) {
            if gap > Duration::seconds(max_gap) {
                return Err(FilterOptError::DataGap(format!(
                    "{}s between bars {} and {} exceeds the {}s limit",
                    gap.num_seconds(),
                    bar - 1,
                    bar,
                    max_gap
                )));
            }
        }

        window
            .bars()
            .iter()
            .enumerate()
            .map(|(i, b)| {
                b.close.ok_or_else(|| {
                    FilterOptError::DataGap(format!("missing close at bar {} ({})", i, b.timestamp))
                })
            })
            .collect()
    }
}

impl Evaluator for FilterBacktester {
    fn evaluate(
        &self,
        candidate: &Candidate,
        space: &FilterParameterSpace,
        window: &HistoricalWindow,
    ) -> Result<Backtest> {
        space.validate_candidate(candidate)?;
        let params = SystemParams::from_candidate(candidate, space)?;
        let closes = self.check_window(&params, window)?;

        let fast_ma = window.sma(params.fast_period)?;
        let slow_ma = window.sma(params.slow_period)?;

        let mut portfolio = Portfolio::from_config(&self.config);
        let mut samples = Vec::with_capacity(closes.len());

        for (i, &price) in closes.iter().enumerate() {
            portfolio.calculate_unrealized_pnl(price);

            if !portfolio.check_liquidation(i, price)? {
                let averages = fast_ma[i].zip(slow_ma[i]);

                if let Some(direction) = portfolio.position.as_ref().map(|p| p.direction) {
                    let risk_exit = portfolio
                        .open_return(price)
                        .and_then(|r| params.risk_exit(r));
                    if let Some(reason) = risk_exit {
                        portfolio.close_position(i, price, reason)?;
                    } else if matches!(averages, Some((f, s)) if params.exit_signal(direction, f, s)) {
                        portfolio.close_position(i, price, ExitReason::Signal)?;
                    }
                }

                if portfolio.position.is_none() {
                    if let Some(direction) = averages.and_then(|(f, s)| params.entry_signal(f, s)) {
                        portfolio.open_position(i, direction, price)?;
                    }
                }

                portfolio.check_liquidation(i, price)?;
            }

            portfolio.update_drawdown();
            samples.push(EquitySample {
                timestamp: window.bars()[i].timestamp,
                equity: portfolio.reported_equity(),
            });
        }

        let last = closes.len() - 1;
        if portfolio.position.is_some() {
            portfolio.close_position(last, closes[last], ExitReason::EndOfData)?;
            portfolio.update_drawdown();
            samples[last].equity = portfolio.reported_equity();
        }

        Ok(Backtest {
            equity_curve: EquityCurve::new(samples)?,
            trades: portfolio.trades,
        })
    }
}
