// src/engines/metrics/profitability.rs
use crate::types::Trade;
use serde::{Deserialize, Serialize};

/// Reported profit factor when there are winners and no losers.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeStats {
    pub count: usize,
    pub winners: usize,
    pub losers: usize,
    /// Fraction of trades with positive profit.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    /// Average losing trade, as a positive amount.
    pub avg_loss: f64,
    pub net_profit: f64,
    pub total_fees: f64,
}

impl TradeStats {
    pub fn calculate(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let (wins, losses): (Vec<&Trade>, Vec<&Trade>) = trades.iter().partition(|t| t.is_winner());

        let gross_profit: f64 = wins.iter().map(|t| t.profit).sum();
        let gross_loss: f64 = losses.iter().map(|t| t.profit.abs()).sum();

        let profit_factor = if gross_loss > 0.0 {
            (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
        } else if gross_profit > 0.0 {
            PROFIT_FACTOR_CAP
        } else {
            0.0
        };

        let avg = |total: f64, n: usize| if n > 0 { total / n as f64 } else { 0.0 };

        Self {
            count: trades.len(),
            winners: wins.len(),
            losers: losses.len(),
            win_rate: wins.len() as f64 / trades.len() as f64,
            profit_factor,
            avg_win: avg(gross_profit, wins.len()),
            avg_loss: avg(gross_loss, losses.len()),
            net_profit: trades.iter().map(|t| t.profit).sum(),
            total_fees: trades.iter().map(|t| t.fees).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, ExitReason};

    fn trade(profit: f64) -> Trade {
        Trade {
            entry_bar: 0,
            exit_bar: 1,
            entry_price: 100.0,
            exit_price: 100.0 + profit,
            direction: Direction::Long,
            size: 1.0,
            profit,
            exit_reason: ExitReason::Signal,
            fees: 0.5,
        }
    }

    #[test]
    fn mixed_trades() {
        let stats = TradeStats::calculate(&[trade(30.0), trade(-10.0), trade(10.0), trade(-10.0)]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.winners, 2);
        assert_eq!(stats.win_rate, 0.5);
        assert_eq!(stats.profit_factor, 2.0);
        assert_eq!(stats.avg_win, 20.0);
        assert_eq!(stats.avg_loss, 10.0);
        assert_eq!(stats.net_profit, 20.0);
        assert_eq!(stats.total_fees, 2.0);
    }

    #[test]
    fn no_losers_caps_profit_factor() {
        let stats = TradeStats::calculate(&[trade(5.0)]);
        assert_eq!(stats.profit_factor, PROFIT_FACTOR_CAP);
    }

    #[test]
    fn empty_trade_list() {
        assert_eq!(TradeStats::calculate(&[]), TradeStats::default());
    }
}
