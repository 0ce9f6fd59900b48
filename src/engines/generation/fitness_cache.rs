use super::candidate::Candidate;
use super::population::EvaluatedCandidate;
use std::collections::HashMap;

/// Cross-generation memo of evaluation outcomes, keyed by assignment.
///
/// Evaluations are deterministic, so a candidate scored once (including a
/// candidate-local failure) never needs to be replayed. Timeouts are not
/// cached.
#[derive(Debug, Default)]
pub struct FitnessCache {
    entries: HashMap<Candidate, EvaluatedCandidate>,
    hits: u64,
    misses: u64,
}

impl FitnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, candidate: &Candidate) -> Option<EvaluatedCandidate> {
        match self.entries.get(candidate) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, evaluated: &EvaluatedCandidate) {
        self.entries
            .entry(evaluated.candidate.unscored())
            .or_insert_with(|| evaluated.clone());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
