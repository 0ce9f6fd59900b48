use super::candidate::Candidate;
use crate::error::{FilterOptError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Default continuous mutation step, as a fraction of the range width.
const DEFAULT_STEP_FRACTION: f64 = 0.1;

/// Value of one filter parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Number(_) => None,
        }
    }

    fn number_bits(v: f64) -> u64 {
        // -0.0 and 0.0 are the same assignment
        (v + 0.0).to_bits()
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
            (ParamValue::Number(a), ParamValue::Number(b)) => {
                Self::number_bits(*a) == Self::number_bits(*b)
            }
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ParamValue::Bool(b) => {
                0u8.hash(state);
                b.hash(state);
            }
            ParamValue::Number(v) => {
                1u8.hash(state);
                Self::number_bits(*v).hash(state);
            }
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Number(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterDomain {
    Continuous { min: f64, max: f64 },
    /// Stored sorted ascending without duplicates.
    Discrete { values: Vec<f64> },
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(flatten)]
    pub domain: ParameterDomain,
    /// Continuous: largest absolute perturbation. Discrete: largest index jump.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_step: Option<f64>,
    /// Overrides the run's mutation rate for this parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_rate: Option<f64>,
}

impl ParameterDef {
    pub fn continuous(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self::with_domain(name, ParameterDomain::Continuous { min, max })
    }

    pub fn discrete(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::with_domain(name, ParameterDomain::Discrete { values })
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::with_domain(name, ParameterDomain::Boolean)
    }

    fn with_domain(name: impl Into<String>, domain: ParameterDomain) -> Self {
        Self {
            name: name.into(),
            domain,
            mutation_step: None,
            mutation_rate: None,
        }
    }

    pub fn with_mutation_step(mut self, step: f64) -> Self {
        self.mutation_step = Some(step);
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = Some(rate);
        self
    }

    fn validate(&mut self) -> Result<()> {
        let invalid = |reason: &str| FilterOptError::invalid_parameter(self.name.clone(), reason);

        if self.name.trim().is_empty() {
            return Err(FilterOptError::invalid_parameter("<unnamed>", "parameter name is empty"));
        }
        match &mut self.domain {
            ParameterDomain::Continuous { min, max } => {
                if !min.is_finite() || !max.is_finite() || *min > *max {
                    return Err(invalid("continuous range must be finite with min <= max"));
                }
                if !(*max - *min).is_finite() {
                    return Err(invalid("continuous range width overflows"));
                }
            }
            ParameterDomain::Discrete { values } => {
                if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
                    return Err(invalid("discrete domain needs at least one finite value"));
                }
                values.sort_by(f64::total_cmp);
                values.dedup_by(|a, b| *a + 0.0 == *b + 0.0);
            }
            ParameterDomain::Boolean => {}
        }
        if matches!(self.mutation_step, Some(s) if !(s > 0.0) || !(2.0 * s).is_finite()) {
            return Err(invalid("mutation step must be positive and finite"));
        }
        if matches!(self.mutation_rate, Some(r) if !(0.0..=1.0).contains(&r)) {
            return Err(invalid("mutation rate must be in [0, 1]"));
        }
        Ok(())
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        match (&self.domain, value) {
            (ParameterDomain::Continuous { min, max }, ParamValue::Number(v)) => {
                v.is_finite() && *v >= *min && *v <= *max
            }
            (ParameterDomain::Discrete { values }, ParamValue::Number(v)) => {
                values.iter().any(|d| ParamValue::Number(*d) == ParamValue::Number(*v))
            }
            (ParameterDomain::Boolean, ParamValue::Bool(_)) => true,
            _ => false,
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParamValue {
        match &self.domain {
            ParameterDomain::Continuous { min, max } => {
                if min == max {
                    ParamValue::Number(*min)
                } else {
                    ParamValue::Number(rng.gen_range(*min..=*max))
                }
            }
            ParameterDomain::Discrete { values } => {
                ParamValue::Number(values[rng.gen_range(0..values.len())])
            }
            ParameterDomain::Boolean => ParamValue::Bool(rng.gen_bool(0.5)),
        }
    }

    /// Bounded perturbation that stays inside the domain.
    pub fn perturb<R: Rng>(&self, value: &ParamValue, rng: &mut R) -> ParamValue {
        match (&self.domain, value) {
            (ParameterDomain::Continuous { min, max }, ParamValue::Number(v)) => {
                let step = self
                    .mutation_step
                    .unwrap_or((max - min) * DEFAULT_STEP_FRACTION);
                if step <= 0.0 {
                    return ParamValue::Number(*v);
                }
                let delta = rng.gen_range(-step..=step);
                ParamValue::Number((v + delta).clamp(*min, *max))
            }
            (ParameterDomain::Discrete { values }, ParamValue::Number(v)) => {
                if values.len() == 1 {
                    return ParamValue::Number(values[0]);
                }
                let current = values
                    .iter()
                    .position(|d| ParamValue::Number(*d) == ParamValue::Number(*v))
                    .unwrap_or(0);
                let max_jump = self.mutation_step.map_or(1, |s| (s.round() as usize).max(1));
                let jump = rng.gen_range(1..=max_jump) as isize;
                let signed = if rng.gen_bool(0.5) { jump } else { -jump };
                let last = values.len() as isize - 1;
                let mut next = current as isize + signed;
                if next < 0 || next > last {
                    // bounce off the edge instead of sticking to it
                    next = current as isize - signed;
                }
                ParamValue::Number(values[next.clamp(0, last) as usize])
            }
            (ParameterDomain::Boolean, ParamValue::Bool(b)) => ParamValue::Bool(!b),
            _ => self.sample(rng),
        }
    }

    /// Position of `value` within the domain, scaled to [0, 1].
    pub fn normalized_position(&self, value: &ParamValue) -> f64 {
        match (&self.domain, value) {
            (ParameterDomain::Continuous { min, max }, ParamValue::Number(v)) => {
                if max > min {
                    ((v - min) / (max - min)).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
            (ParameterDomain::Discrete { values }, ParamValue::Number(v)) => {
                if values.len() < 2 {
                    return 0.0;
                }
                let idx = values.partition_point(|d| d < v);
                idx.min(values.len() - 1) as f64 / (values.len() - 1) as f64
            }
            (ParameterDomain::Boolean, ParamValue::Bool(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Number of distinct values, or `None` for a non-degenerate continuous range.
    pub fn cardinality(&self) -> Option<u128> {
        match &self.domain {
            ParameterDomain::Continuous { min, max } => (min == max).then_some(1),
            ParameterDomain::Discrete { values } => Some(values.len() as u128),
            ParameterDomain::Boolean => Some(2),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SpaceDef {
    parameters: Vec<ParameterDef>,
}

/// Ordered set of named filter parameters. Immutable once built; an
/// optimization run shares it read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpaceDef", into = "SpaceDef")]
pub struct FilterParameterSpace {
    parameters: Vec<ParameterDef>,
}

impl TryFrom<SpaceDef> for FilterParameterSpace {
    type Error = FilterOptError;

    fn try_from(def: SpaceDef) -> Result<Self> {
        Self::new(def.parameters)
    }
}

impl From<FilterParameterSpace> for SpaceDef {
    fn from(space: FilterParameterSpace) -> Self {
        SpaceDef {
            parameters: space.parameters,
        }
    }
}

impl FilterParameterSpace {
    pub fn new(mut parameters: Vec<ParameterDef>) -> Result<Self> {
        if parameters.is_empty() {
            return Err(FilterOptError::Configuration(
                "parameter space has no parameters".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for def in &mut parameters {
            def.validate()?;
            if !names.insert(def.name.clone()) {
                return Err(FilterOptError::invalid_parameter(
                    def.name.clone(),
                    "declared more than once",
                ));
            }
        }
        Ok(Self { parameters })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    /// Value of the named parameter in `candidate`, if the space declares it.
    pub fn value_of<'a>(&self, candidate: &'a Candidate, name: &str) -> Option<&'a ParamValue> {
        self.index_of(name).and_then(|i| candidate.values().get(i))
    }

    pub fn validate_candidate(&self, candidate: &Candidate) -> Result<()> {
        if candidate.len() != self.parameters.len() {
            return Err(FilterOptError::invalid_parameter(
                "<candidate>",
                format!(
                    "expected {} values, got {}",
                    self.parameters.len(),
                    candidate.len()
                ),
            ));
        }
        for (def, value) in self.parameters.iter().zip(candidate.values()) {
            if !def.contains(value) {
                return Err(FilterOptError::invalid_parameter(
                    def.name.clone(),
                    format!("value {} is outside its domain", value),
                ));
            }
        }
        Ok(())
    }

    /// Uniform sample across every domain.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Candidate {
        Candidate::new(self.parameters.iter().map(|p| p.sample(rng)).collect())
    }

    /// Number of distinct candidates, `None` when any range is continuous.
    /// Saturates at `u128::MAX`.
    pub fn cardinality(&self) -> Option<u128> {
        self.parameters
            .iter()
            .try_fold(1u128, |acc, p| p.cardinality().map(|c| acc.saturating_mul(c)))
    }
}
