use super::fitness::Fitness;
use super::parameter_space::{FilterParameterSpace, ParamValue};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// One assignment of a value to every parameter of a space, in declaration
/// order. A value object: equality and hashing look only at the values, never
/// at the attached fitness. Operators return new candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    values: Vec<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fitness: Option<Fitness>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Candidate {}

impl Hash for Candidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl Candidate {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self {
            values,
            fitness: None,
        }
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.as_ref()
    }

    pub fn with_fitness(&self, fitness: Fitness) -> Self {
        Self {
            values: self.values.clone(),
            fitness: Some(fitness),
        }
    }

    /// Same assignment with no fitness attached.
    pub fn unscored(&self) -> Self {
        Self::new(self.values.clone())
    }

    /// Single-point crossover: the first `point` values from `self`, the rest
    /// from `other`.
    pub fn splice(&self, other: &Candidate, point: usize) -> Candidate {
        let point = point.min(self.values.len());
        let mut values = self.values[..point].to_vec();
        values.extend_from_slice(&other.values[point.min(other.values.len())..]);
        Candidate::new(values)
    }

    /// Each value independently from either parent.
    pub fn uniform_crossover<R: Rng>(&self, other: &Candidate, rng: &mut R) -> Candidate {
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| if rng.gen_bool(0.5) { *a } else { *b })
            .collect();
        Candidate::new(values)
    }

    /// Perturb each value with probability `rate`, or the parameter's own
    /// rate when it declares one.
    pub fn mutate<R: Rng>(&self, space: &FilterParameterSpace, rate: f64, rng: &mut R) -> Candidate {
        let values = self
            .values
            .iter()
            .zip(space.parameters())
            .map(|(value, def)| {
                let p = def.mutation_rate.unwrap_or(rate);
                if rng.gen::<f64>() < p {
                    def.perturb(value, rng)
                } else {
                    *value
                }
            })
            .collect();
        Candidate::new(values)
    }

    /// Perturb exactly one randomly chosen value.
    pub fn mutate_one<R: Rng>(&self, space: &FilterParameterSpace, rng: &mut R) -> Candidate {
        let mut values = self.values.clone();
        let n = values.len().min(space.len());
        if n > 0 {
            let idx = rng.gen_range(0..n);
            values[idx] = space.parameters()[idx].perturb(&values[idx], rng);
        }
        Candidate::new(values)
    }

    /// Parameter name to value, for reporting.
    pub fn named(&self, space: &FilterParameterSpace) -> BTreeMap<String, ParamValue> {
        space
            .parameters()
            .iter()
            .zip(&self.values)
            .map(|(def, value)| (def.name.clone(), *value))
            .collect()
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}
