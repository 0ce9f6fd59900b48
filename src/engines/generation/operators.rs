use crate::config::{CrossoverKind, SelectionPolicy};
use crate::engines::generation::candidate::Candidate;
use crate::engines::generation::population::EvaluatedCandidate;
use rand::Rng;

// Every selection function takes `ranked` best-first and non-empty.

/// Tournament selection: pick best of K random candidates
pub fn tournament_selection<'a, R: Rng>(
    ranked: &'a [EvaluatedCandidate],
    tournament_size: usize,
    rng: &mut R,
) -> &'a Candidate {
    // Lower index means better rank.
    let mut best_idx = rng.gen_range(0..ranked.len());
    for _ in 1..tournament_size {
        best_idx = best_idx.min(rng.gen_range(0..ranked.len()));
    }
    &ranked[best_idx].candidate
}

/// Roulette wheel selection: probability proportional to score shifted so the
/// worst candidate still has a small share.
pub fn roulette_selection<'a, R: Rng>(ranked: &'a [EvaluatedCandidate], rng: &mut R) -> &'a Candidate {
    let worst = ranked[ranked.len() - 1].fitness.score;
    let best = ranked[0].fitness.score;
    let span = best - worst;
    if !(span > 0.0) || !span.is_finite() {
        return &ranked[rng.gen_range(0..ranked.len())].candidate;
    }

    let floor = span / ranked.len() as f64;
    let weights: Vec<f64> = ranked
        .iter()
        .map(|e| e.fitness.score - worst + floor)
        .collect();
    let total: f64 = weights.iter().sum();

    let mut spin = rng.gen::<f64>() * total;
    for (entry, weight) in ranked.iter().zip(&weights) {
        spin -= weight;
        if spin <= 0.0 {
            return &entry.candidate;
        }
    }

    // Fallback
    &ranked[ranked.len() - 1].candidate
}

/// Linear rank weights: best of n has weight n, worst has weight 1.
pub fn rank_selection<'a, R: Rng>(ranked: &'a [EvaluatedCandidate], rng: &mut R) -> &'a Candidate {
    let n = ranked.len() as u64;
    let total = n * (n + 1) / 2;
    let mut spin = rng.gen_range(0..total);
    for (i, entry) in ranked.iter().enumerate() {
        let weight = n - i as u64;
        if spin < weight {
            return &entry.candidate;
        }
        spin -= weight;
    }
    &ranked[ranked.len() - 1].candidate
}

pub fn select_parent<'a, R: Rng>(
    policy: SelectionPolicy,
    ranked: &'a [EvaluatedCandidate],
    rng: &mut R,
) -> &'a Candidate {
    match policy {
        SelectionPolicy::RankProportional => rank_selection(ranked, rng),
        SelectionPolicy::Tournament { size } => tournament_selection(ranked, size, rng),
        SelectionPolicy::Roulette => roulette_selection(ranked, rng),
    }
}

pub fn crossover<R: Rng>(kind: CrossoverKind, a: &Candidate, b: &Candidate, rng: &mut R) -> Candidate {
    match kind {
        CrossoverKind::Uniform => a.uniform_crossover(b, rng),
        CrossoverKind::SinglePoint => {
            let len = a.len().min(b.len());
            if len <= 1 {
                return a.unscored();
            }
            let point = rng.gen_range(1..len);
            a.splice(b, point)
        }
    }
}
