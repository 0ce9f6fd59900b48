use super::candidate::Candidate;
use super::fitness::Fitness;
use crate::engines::metrics::PerformanceStats;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Candidates of one generation, in insertion order, without duplicates.
#[derive(Debug, Clone, Default)]
pub struct Population {
    members: Vec<Candidate>,
    seen: HashSet<Candidate>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: Vec::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Keeps the first occurrence of each candidate.
    pub fn from_candidates<I: IntoIterator<Item = Candidate>>(candidates: I) -> Self {
        let mut population = Self::new();
        for c in candidates {
            population.push_unique(c);
        }
        population
    }

    /// Returns false, leaving the population unchanged, for a duplicate.
    pub fn push_unique(&mut self, candidate: Candidate) -> bool {
        if self.seen.contains(&candidate) {
            return false;
        }
        self.seen.insert(candidate.unscored());
        self.members.push(candidate);
        true
    }

    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.seen.contains(candidate)
    }

    pub fn members(&self) -> &[Candidate] {
        &self.members
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.members
    }
}

/// A candidate together with its evaluation outcome. Produced by the engine
/// from worker results; never shared between candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedCandidate {
    pub candidate: Candidate,
    pub fitness: Fitness,
    /// Run-wide order in which this assignment was first submitted.
    pub discovery: u64,
    pub stats: Option<PerformanceStats>,
    /// Set when the evaluation failed and the fitness is `Fitness::unfit()`.
    pub failure: Option<String>,
}

impl EvaluatedCandidate {
    pub fn is_fit(&self) -> bool {
        self.failure.is_none() && !self.fitness.is_unfit()
    }
}
