use super::fitness::Fitness;
use super::population::EvaluatedCandidate;
use std::cmp::Ordering;

/// Orders fitness values and decides improvement.
///
/// `compare` is a total order: score first, then higher total return, then
/// lower drawdown, each compared with `f64::total_cmp`. Among fitnesses that
/// compare equal, `rank` keeps earlier discoveries first.
pub struct RunComparator;

impl RunComparator {
    pub fn compare(a: &Fitness, b: &Fitness) -> Ordering {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.total_return.total_cmp(&b.total_return))
            .then_with(|| b.max_drawdown.total_cmp(&a.max_drawdown))
    }

    /// Best first. Stable over the discovery order.
    pub fn rank(evaluated: &mut [EvaluatedCandidate]) {
        evaluated.sort_by(|a, b| {
            Self::compare(&b.fitness, &a.fitness).then_with(|| a.discovery.cmp(&b.discovery))
        });
    }

    /// True if `candidate` should replace `best` as the run's best. Ties keep
    /// the incumbent.
    pub fn replaces(candidate: &Fitness, best: Option<&Fitness>) -> bool {
        best.map_or(true, |b| Self::compare(candidate, b) == Ordering::Greater)
    }

    /// True if `candidate` beats `best` by more than `epsilon` in score.
    pub fn improves(candidate: &Fitness, best: Option<&Fitness>, epsilon: f64) -> bool {
        match best {
            None => !candidate.is_unfit(),
            Some(b) => candidate.score - b.score > epsilon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(score: f64, total_return: f64, max_drawdown: f64) -> Fitness {
        Fitness {
            score,
            total_return,
            max_drawdown,
        }
    }

    #[test]
    fn tie_breaks_on_return_then_drawdown() {
        assert_eq!(
            RunComparator::compare(&f(1.0, 0.2, 0.1), &f(1.0, 0.1, 0.0)),
            Ordering::Greater
        );
        assert_eq!(
            RunComparator::compare(&f(1.0, 0.2, 0.1), &f(1.0, 0.2, 0.3)),
            Ordering::Greater
        );
        assert_eq!(
            RunComparator::compare(&f(1.0, 0.2, 0.1), &f(1.0, 0.2, 0.1)),
            Ordering::Equal
        );
    }

    #[test]
    fn unfit_is_below_everything_real() {
        assert_eq!(
            RunComparator::compare(&Fitness::unfit(), &f(-1e9, -1.0, 1.0)),
            Ordering::Less
        );
    }

    #[test]
    fn ties_do_not_replace() {
        let best = f(0.5, 0.1, 0.1);
        assert!(!RunComparator::replaces(&best, Some(&best)));
        assert!(RunComparator::replaces(&f(0.6, 0.0, 0.9), Some(&best)));
        assert!(RunComparator::replaces(&best, None));
    }

    #[test]
    fn improvement_respects_epsilon() {
        let best = f(1.0, 0.0, 0.0);
        assert!(!RunComparator::improves(&f(1.0005, 0.0, 0.0), Some(&best), 0.001));
        assert!(RunComparator::improves(&f(1.01, 0.0, 0.0), Some(&best), 0.001));
        assert!(!RunComparator::improves(&best, Some(&best), 0.0));
    }
}
