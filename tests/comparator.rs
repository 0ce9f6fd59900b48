use filteropt::engines::generation::{Candidate, EvaluatedCandidate, Fitness, ParamValue, RunComparator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

fn fitness(score: f64, total_return: f64, max_drawdown: f64) -> Fitness {
    Fitness {
        score,
        total_return,
        max_drawdown,
    }
}

fn evaluated(id: f64, fitness: Fitness, discovery: u64) -> EvaluatedCandidate {
    EvaluatedCandidate {
        candidate: Candidate::new(vec![ParamValue::Number(id)]),
        fitness,
        discovery,
        stats: None,
        failure: None,
    }
}

fn sample_fitnesses() -> Vec<Fitness> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut values: Vec<Fitness> = (0..40)
        .map(|_| {
            // Coarse grid so ties on every component occur.
            fitness(
                rng.gen_range(-2..3) as f64 * 0.5,
                rng.gen_range(-2..3) as f64 * 0.1,
                rng.gen_range(0..3) as f64 * 0.1,
            )
        })
        .collect();
    values.push(Fitness::unfit());
    values.push(fitness(0.0, 0.0, 0.0));
    values
}

#[test]
fn compare_is_a_strict_weak_ordering() {
    let values = sample_fitnesses();

    for a in &values {
        // Irreflexive
        assert_eq!(RunComparator::compare(a, a), Ordering::Equal);
        for b in &values {
            // Antisymmetric
            assert_eq!(RunComparator::compare(a, b), RunComparator::compare(b, a).reverse());
            for c in &values {
                let ab = RunComparator::compare(a, b);
                let bc = RunComparator::compare(b, c);
                // Transitive, including transitivity of equivalence
                if ab == bc {
                    assert_eq!(RunComparator::compare(a, c), ab);
                }
            }
        }
    }
}

#[test]
fn rank_is_stable_over_discovery_order() {
    let tied = fitness(1.0, 0.2, 0.1);
    let mut entries = vec![
        evaluated(1.0, fitness(0.5, 0.1, 0.1), 0),
        evaluated(2.0, tied, 3),
        evaluated(3.0, tied, 1),
        evaluated(4.0, Fitness::unfit(), 2),
        evaluated(5.0, tied, 2),
        evaluated(6.0, fitness(2.0, 0.0, 0.5), 4),
    ];

    RunComparator::rank(&mut entries);
    let order: Vec<u64> = entries.iter().map(|e| e.discovery).collect();
    assert_eq!(order, vec![4, 1, 2, 3, 0, 2]);

    // Ranking an already ranked list changes nothing.
    let before: Vec<Candidate> = entries.iter().map(|e| e.candidate.clone()).collect();
    RunComparator::rank(&mut entries);
    let after: Vec<Candidate> = entries.iter().map(|e| e.candidate.clone()).collect();
    assert_eq!(before, after);
}

#[test]
fn improvement_respects_epsilon() {
    let best = fitness(1.0, 0.1, 0.1);
    assert!(RunComparator::improves(&fitness(1.2, 0.1, 0.1), Some(&best), 0.1));
    assert!(!RunComparator::improves(&fitness(1.05, 0.1, 0.1), Some(&best), 0.1));
    assert!(!RunComparator::improves(&best, Some(&best), 0.0));
    assert!(RunComparator::improves(&best, None, 0.0));
    assert!(!RunComparator::improves(&Fitness::unfit(), None, 0.0));
}

#[test]
fn replacement_needs_a_strictly_better_fitness() {
    let best = fitness(1.0, 0.1, 0.1);
    assert!(!RunComparator::replaces(&best, Some(&best)));
    assert!(RunComparator::replaces(&fitness(1.0, 0.1, 0.05), Some(&best)));
    assert!(!RunComparator::replaces(&fitness(0.9, 0.5, 0.0), Some(&best)));
    assert!(RunComparator::replaces(&Fitness::unfit(), None));
}
