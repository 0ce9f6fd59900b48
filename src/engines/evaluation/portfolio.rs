use crate::config::BacktestingConfig;
use crate::error::{FilterOptError, Result};
use crate::types::{Direction, ExitReason, Trade};

pub struct Portfolio {
    pub initial_capital: f64,
    pub cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,

    // Cost model
    pub position_size: f64,
    pub commission: f64,
    pub slippage: f64,
    pub equity_floor: f64,

    // P&L and Drawdown Tracking
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub current_position_value: f64,
    pub peak_equity: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,

    /// Set once equity touches the floor; no further positions are opened.
    pub liquidated: bool,
}

pub struct Position {
    pub direction: Direction,
    pub entry_bar: usize,
    /// Fill price including slippage.
    pub entry_price: f64,
    pub size: f64,
    pub entry_fee: f64,
}

impl Portfolio {
    /// Frictionless portfolio committing 10% of equity per position.
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            position_size: 0.1,
            commission: 0.0,
            slippage: 0.0,
            equity_floor: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_pnl: 0.0,
            current_position_value: 0.0,
            peak_equity: initial_capital,
            max_drawdown: 0.0,
            current_drawdown: 0.0,
            liquidated: false,
        }
    }

    pub fn from_config(config: &BacktestingConfig) -> Self {
        Self {
            position_size: config.position_size,
            commission: config.commission,
            slippage: config.slippage,
            equity_floor: config.equity_floor,
            ..Self::new(config.initial_capital)
        }
    }

    pub fn open_position(&mut self, bar: usize, direction: Direction, price: f64) -> Result<()> {
        if self.position.is_some() {
            return Err(FilterOptError::Generation(format!(
                "bar {}: position already open",
                bar
            )));
        }
        if !(price > 0.0) || !price.is_finite() {
            return Err(FilterOptError::DataGap(format!(
                "bar {}: cannot fill at price {}",
                bar, price
            )));
        }

        let fill = price * (1.0 + direction.sign() * self.slippage);
        let notional = self.equity().max(0.0) * self.position_size;
        let quantity = notional / fill;
        let fee = notional * self.commission;

        match direction {
            Direction::Long => self.cash -= quantity * fill + fee,
            Direction::Short => self.cash += quantity * fill - fee, // Add proceeds from short sale
        }
        self.realized_pnl -= fee;

        self.position = Some(Position {
            direction,
            entry_bar: bar,
            entry_price: fill,
            size: quantity,
            entry_fee: fee,
        });
        self.calculate_unrealized_pnl(price);

        Ok(())
    }

    pub fn close_position(&mut self, bar: usize, price: f64, reason: ExitReason) -> Result<()> {
        if let Some(pos) = self.position.take() {
            let sign = pos.direction.sign();
            let fill = price * (1.0 - sign * self.slippage);
            let gross = (fill - pos.entry_price) * pos.size * sign;
            let exit_fee = fill * pos.size * self.commission;

            match pos.direction {
                Direction::Long => self.cash += fill * pos.size - exit_fee,
                Direction::Short => self.cash -= fill * pos.size + exit_fee, // Deduct cost to buy back
            }
            self.realized_pnl += gross - exit_fee;

            self.trades.push(Trade {
                entry_bar: pos.entry_bar,
                exit_bar: bar,
                entry_price: pos.entry_price,
                exit_price: fill,
                direction: pos.direction,
                size: pos.size,
                profit: gross - pos.entry_fee - exit_fee,
                exit_reason: reason,
                fees: pos.entry_fee + exit_fee,
            });
        }
        self.calculate_unrealized_pnl(price);

        Ok(())
    }

    /// Force-close at `price` and stop trading if equity is at or below the
    /// floor. Returns true when the portfolio is (now) liquidated.
    pub fn check_liquidation(&mut self, bar: usize, price: f64) -> Result<bool> {
        if self.liquidated {
            return Ok(true);
        }
        if self.equity() <= self.equity_floor {
            self.close_position(bar, price, ExitReason::Liquidation)?;
            self.liquidated = true;
            log::trace!("Liquidated at bar {} with equity {:.2}", bar, self.equity());
        }
        Ok(self.liquidated)
    }

    pub fn get_trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Return of the open position at `price`, relative to its entry fill.
    pub fn open_return(&self, price: f64) -> Option<f64> {
        self.position
            .as_ref()
            .map(|p| (price / p.entry_price - 1.0) * p.direction.sign())
    }

    // P&L and Drawdown Calculation Methods

    /// Calculate unrealized P&L for the open position.
    pub fn calculate_unrealized_pnl(&mut self, current_price: f64) {
        if let Some(position) = &self.position {
            let current_value = position.size * current_price;
            self.unrealized_pnl =
                (current_price - position.entry_price) * position.size * position.direction.sign();
            self.current_position_value = current_value * position.direction.sign();
        } else {
            self.unrealized_pnl = 0.0;
            self.current_position_value = 0.0;
        }

        self.total_pnl = self.realized_pnl + self.unrealized_pnl;
    }

    /// Get total portfolio value (cash + signed position value at current price).
    pub fn total_value(&self) -> f64 {
        self.cash + self.current_position_value
    }

    /// Get equity (initial capital + total P&L).
    pub fn equity(&self) -> f64 {
        self.initial_capital + self.total_pnl
    }

    /// Equity as recorded on the curve: never below the floor.
    pub fn reported_equity(&self) -> f64 {
        self.equity().max(self.equity_floor)
    }

    /// Update drawdown based on the current equity.
    pub fn update_drawdown(&mut self) {
        let current_equity = self.reported_equity();

        if current_equity > self.peak_equity {
            self.peak_equity = current_equity;
        }

        if self.peak_equity > 0.0 {
            self.current_drawdown = (self.peak_equity - current_equity) / self.peak_equity;

            if self.current_drawdown > self.max_drawdown {
                self.max_drawdown = self.current_drawdown;
            }
        }
    }
}
