use super::traits::{check_unit_interval, ConfigSection};
use crate::error::FilterOptError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub population_size: usize,
    pub max_generations: usize,
    /// Wall-clock budget for the whole run. `None` disables it.
    pub max_duration_secs: Option<u64>,
    pub convergence_epsilon: f64,
    /// Generations without an improvement above epsilon before convergence.
    pub convergence_patience: usize,
    /// Runs converge when population diversity drops below this. 0 disables.
    pub min_diversity: f64,
    pub selection: SelectionPolicy,
    pub elitism_count: usize,
    pub crossover: CrossoverKind,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub seed: u64,
    pub strategy: StrategyKind,
    /// Reuse fitness of candidates already scored in earlier generations.
    pub cache_fitness: bool,
    /// Extra offspring draws per open slot before falling back to random samples.
    pub max_refill_attempts: usize,
    /// Share of fresh uniform samples in each generation of the simple strategy.
    pub exploration_rate: f64,
    /// Distinct best candidates kept across the whole run.
    pub hall_of_fame_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Linear rank weights: the best of n gets weight n, the worst gets 1.
    RankProportional,
    Tournament { size: usize },
    Roulette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverKind {
    Uniform,
    SinglePoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    Genetic,
    Simple,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            max_duration_secs: None,
            convergence_epsilon: 1e-6,
            convergence_patience: 10,
            min_diversity: 0.0,
            selection: SelectionPolicy::RankProportional,
            elitism_count: 2,
            crossover: CrossoverKind::Uniform,
            crossover_rate: 0.85,
            mutation_rate: 0.15,
            seed: 42,
            strategy: StrategyKind::Genetic,
            cache_fitness: true,
            max_refill_attempts: 64,
            exploration_rate: 0.2,
            hall_of_fame_size: 10,
        }
    }
}

impl OptimizationConfig {
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

impl ConfigSection for OptimizationConfig {
    fn section_name() -> &'static str {
        "optimization"
    }

    fn validate(&self) -> Result<(), FilterOptError> {
        if self.population_size < 2 {
            return Err(FilterOptError::Configuration(
                "Population size must be at least 2".to_string(),
            ));
        }
        if self.max_generations == 0 {
            return Err(FilterOptError::Configuration(
                "Generation budget must be at least 1".to_string(),
            ));
        }
        if self.elitism_count == 0 || self.elitism_count >= self.population_size {
            return Err(FilterOptError::Configuration(format!(
                "Elitism count must be in 1..{}, got {}",
                self.population_size, self.elitism_count
            )));
        }
        if !self.convergence_epsilon.is_finite() || self.convergence_epsilon < 0.0 {
            return Err(FilterOptError::Configuration(
                "Convergence epsilon must be a non-negative number".to_string(),
            ));
        }
        if let SelectionPolicy::Tournament { size } = self.selection {
            if size == 0 {
                return Err(FilterOptError::Configuration(
                    "Tournament size must be at least 1".to_string(),
                ));
            }
        }
        if self.hall_of_fame_size == 0 {
            return Err(FilterOptError::Configuration(
                "Hall of fame size must be at least 1".to_string(),
            ));
        }
        check_unit_interval(Self::section_name(), "min_diversity", self.min_diversity)?;
        check_unit_interval(Self::section_name(), "crossover_rate", self.crossover_rate)?;
        check_unit_interval(Self::section_name(), "mutation_rate", self.mutation_rate)?;
        check_unit_interval(Self::section_name(), "exploration_rate", self.exploration_rate)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(OptimizationConfig::default().validate().is_ok());
    }

    #[test]
    fn elitism_must_leave_room_for_offspring() {
        let config = OptimizationConfig {
            population_size: 4,
            elitism_count: 4,
            ..OptimizationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rates_outside_unit_interval_rejected() {
        let config = OptimizationConfig {
            mutation_rate: 1.5,
            ..OptimizationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn tournament_of_zero_rejected() {
        let config = OptimizationConfig {
            selection: SelectionPolicy::Tournament { size: 0 },
            ..OptimizationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
