use crate::data::HistoricalWindow;
use crate::engines::generation::{Candidate, FilterParameterSpace};
use crate::error::Result;
use crate::types::Backtest;

/// Replays one candidate over a historical window.
///
/// Implementations must be deterministic (same inputs, same backtest) and
/// must not mutate shared state: many workers call `evaluate` concurrently on
/// the same window.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        candidate: &Candidate,
        space: &FilterParameterSpace,
        window: &HistoricalWindow,
    ) -> Result<Backtest>;
}

impl<F> Evaluator for F
where
    F: Fn(&Candidate, &FilterParameterSpace, &HistoricalWindow) -> Result<Backtest> + Send + Sync,
{
    fn evaluate(
        &self,
        candidate: &Candidate,
        space: &FilterParameterSpace,
        window: &HistoricalWindow,
    ) -> Result<Backtest> {
        self(candidate, space, window)
    }
}
