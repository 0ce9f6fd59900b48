// src/engines/metrics/returns.rs

/// Simple per-period returns of an equity series. A period that starts at or
/// below zero equity has nothing at risk and counts as a flat period.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

/// Compound growth rate scaled to a year of `periods_per_year` periods.
pub fn annualized_return(total_return: f64, periods: usize, periods_per_year: f64) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    let annualized = growth.powf(periods_per_year / periods as f64) - 1.0;
    if annualized.is_finite() {
        annualized
    } else {
        f64::MAX
    }
}
