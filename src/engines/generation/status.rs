use super::candidate::Candidate;
use super::fitness::Fitness;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Initializing,
    Evaluating,
    Ranking,
    Reproducing,
    Converged,
    BudgetExhausted,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Converged | RunState::BudgetExhausted | RunState::Failed | RunState::Cancelled
        )
    }
}

/// Consistent snapshot of a run, as returned by status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    /// Generations completed so far (the one being evaluated is `generation + 1`).
    pub generation: usize,
    pub best_candidate: Option<Candidate>,
    pub best_fitness: Option<Fitness>,
    pub failure: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            state: RunState::Initializing,
            generation: 0,
            best_candidate: None,
            best_fitness: None,
            failure: None,
        }
    }
}

/// Shared, lock-protected status written by the engine and read by pollers.
/// Every write replaces whole fields under one lock, so readers never see a
/// best candidate from one generation paired with the count of another.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<RunStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RunStatus {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> RunState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    pub fn set_state(&self, state: RunState) {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).state = state;
    }

    /// Record a completed generation and the run's best so far.
    pub fn publish_generation(&self, generation: usize, best: Option<(&Candidate, &Fitness)>) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        status.generation = generation;
        if let Some((candidate, fitness)) = best {
            status.best_candidate = Some(candidate.with_fitness(*fitness));
            status.best_fitness = Some(*fitness);
        }
    }

    pub fn finish(&self, state: RunState, failure: Option<String>) {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        status.state = state;
        status.failure = failure;
    }
}

/// Cooperative cancellation flag shared between a run and its controllers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::parameter_space::ParamValue;

    #[test]
    fn terminal_states() {
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Evaluating.is_terminal());
    }

    #[test]
    fn snapshot_pairs_best_with_generation() {
        let board = StatusBoard::new();
        let candidate = Candidate::new(vec![ParamValue::Number(1.0)]);
        let fitness = Fitness {
            score: 0.5,
            total_return: 0.1,
            max_drawdown: 0.05,
        };
        board.publish_generation(3, Some((&candidate, &fitness)));
        let status = board.snapshot();
        assert_eq!(status.generation, 3);
        assert_eq!(status.best_fitness, Some(fitness));
        assert_eq!(status.best_candidate, Some(candidate));
    }

    #[test]
    fn clones_share_cancellation() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
    }
}
