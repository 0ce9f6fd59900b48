use super::candidate::Candidate;
use super::operators::{crossover, select_parent};
use super::parameter_space::FilterParameterSpace;
use super::population::{EvaluatedCandidate, Population};
use crate::config::{CrossoverKind, OptimizationConfig, SelectionPolicy, StrategyKind};
use rand::Rng;

/// Everything a strategy may look at when building the next generation.
pub struct ProposalInput<'a> {
    pub space: &'a FilterParameterSpace,
    pub current: &'a Population,
    /// Fit candidates of the current generation, best first. Never empty.
    pub ranked: &'a [EvaluatedCandidate],
    /// Carried over unchanged, in order, before any offspring.
    pub elites: &'a [Candidate],
    pub target_size: usize,
    pub max_refill_attempts: usize,
}

/// How the next population is derived from a ranked generation. The engine's
/// evaluate/rank loop is the same for every variant.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStrategy {
    /// Selection, crossover and mutation with elitism.
    Genetic {
        selection: SelectionPolicy,
        crossover: CrossoverKind,
        crossover_rate: f64,
        mutation_rate: f64,
    },
    /// Local search around the current leaders: elites, single-parameter
    /// mutations of the top ranked candidates, and a share of fresh samples.
    Simple { exploration_rate: f64 },
}

impl SearchStrategy {
    pub fn from_config(config: &OptimizationConfig) -> Self {
        match config.strategy {
            StrategyKind::Genetic => SearchStrategy::Genetic {
                selection: config.selection,
                crossover: config.crossover,
                crossover_rate: config.crossover_rate,
                mutation_rate: config.mutation_rate,
            },
            StrategyKind::Simple => SearchStrategy::Simple {
                exploration_rate: config.exploration_rate,
            },
        }
    }

    pub fn propose_next_population<R: Rng>(&self, input: &ProposalInput<'_>, rng: &mut R) -> Population {
        let target = input.target_size;
        let mut next = Population::with_capacity(target);
        for elite in input.elites.iter().take(target) {
            next.push_unique(elite.unscored());
        }

        let budget = target.saturating_mul(input.max_refill_attempts.max(1));
        let mut attempts = 0usize;

        match self {
            SearchStrategy::Genetic {
                selection,
                crossover: kind,
                crossover_rate,
                mutation_rate,
            } => {
                while next.len() < target && attempts < budget {
                    attempts += 1;
                    let first = select_parent(*selection, input.ranked, rng);
                    let child = if rng.gen::<f64>() < *crossover_rate {
                        let second = select_parent(*selection, input.ranked, rng);
                        crossover(*kind, first, second, rng)
                    } else {
                        first.unscored()
                    };
                    next.push_unique(child.mutate(input.space, *mutation_rate, rng));
                }
            }
            SearchStrategy::Simple { exploration_rate } => {
                let open = target.saturating_sub(next.len());
                let explore = (open as f64 * exploration_rate).round() as usize;
                let explore_target = next.len() + explore.min(open);
                while next.len() < explore_target && attempts < budget {
                    attempts += 1;
                    next.push_unique(input.space.sample(rng));
                }

                let mut leader = 0usize;
                while next.len() < target && attempts < budget {
                    attempts += 1;
                    let parent = &input.ranked[leader % input.ranked.len()].candidate;
                    leader += 1;
                    next.push_unique(parent.mutate_one(input.space, rng));
                }
            }
        }

        // Duplicate-heavy neighbourhoods: top up with uniform samples.
        let mut refill = 0usize;
        while next.len() < target && refill < budget {
            refill += 1;
            next.push_unique(input.space.sample(rng));
        }
        if next.len() < target {
            log::debug!(
                "Next population short: {} of {} distinct candidates",
                next.len(),
                target
            );
        }

        next
    }
}
