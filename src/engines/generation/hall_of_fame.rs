use super::candidate::Candidate;
use super::comparator::RunComparator;
use super::population::EvaluatedCandidate;
use std::collections::HashSet;

/// Bounded list of the best distinct candidates seen during a run.
pub struct HallOfFame {
    entries: Vec<EvaluatedCandidate>,
    max_size: usize,
    seen: HashSet<Candidate>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size,
            seen: HashSet::new(),
        }
    }

    /// Attempt to add a candidate. Unfit candidates and duplicates are rejected.
    pub fn try_add(&mut self, entry: &EvaluatedCandidate) -> bool {
        if !entry.is_fit() || self.seen.contains(&entry.candidate) {
            return false;
        }

        self.entries.push(entry.clone());
        self.seen.insert(entry.candidate.unscored());

        RunComparator::rank(&mut self.entries);
        while self.entries.len() > self.max_size {
            if let Some(removed) = self.entries.pop() {
                self.seen.remove(&removed.candidate);
            }
        }

        // Still present unless it ranked below the cut
        self.seen.contains(&entry.candidate)
    }

    pub fn get_all(&self) -> &[EvaluatedCandidate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
