use super::candidate::Candidate;
use super::parameter_space::FilterParameterSpace;

/// Spread of a population across the space, in [0, 1].
///
/// For each parameter, values are mapped to their normalized position in the
/// domain and the population standard deviation is doubled (a 50/50 split
/// between the extremes scores 1). The result is the mean over parameters.
/// Empty and single-member populations score 0.
pub fn population_diversity(space: &FilterParameterSpace, candidates: &[Candidate]) -> f64 {
    if candidates.len() < 2 || space.is_empty() {
        return 0.0;
    }

    let n = candidates.len() as f64;
    let total: f64 = space
        .parameters()
        .iter()
        .enumerate()
        .map(|(i, def)| {
            let positions: Vec<f64> = candidates
                .iter()
                .filter_map(|c| c.values().get(i))
                .map(|v| def.normalized_position(v))
                .collect();
            let mean = positions.iter().sum::<f64>() / n;
            let variance = positions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
            (2.0 * variance.sqrt()).min(1.0)
        })
        .sum();

    total / space.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::parameter_space::{ParamValue, ParameterDef};

    fn space() -> FilterParameterSpace {
        FilterParameterSpace::new(vec![ParameterDef::continuous("x", 0.0, 10.0)]).unwrap()
    }

    fn c(v: f64) -> Candidate {
        Candidate::new(vec![ParamValue::Number(v)])
    }

    #[test]
    fn identical_population_has_zero_diversity() {
        assert_eq!(population_diversity(&space(), &[c(3.0), c(3.0), c(3.0)]), 0.0);
    }

    #[test]
    fn extremes_have_full_diversity() {
        let d = population_diversity(&space(), &[c(0.0), c(10.0)]);
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_member_is_zero() {
        assert_eq!(population_diversity(&space(), &[c(5.0)]), 0.0);
    }
}
