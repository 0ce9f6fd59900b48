use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterOptError {
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Unusable parameter '{name}': {reason}")]
    UnusableParameter { name: String, reason: String },

    #[error("Data gap: {0}")]
    DataGap(String),

    #[error("Equity curve is empty")]
    EmptyCurve,

    #[error("Invalid equity curve: {0}")]
    InvalidCurve(String),

    #[error("Evaluation timed out after {0:?}")]
    EvaluationTimeout(Duration),

    #[error("Evaluation panicked: {0}")]
    EvaluationPanic(String),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Worker pool queue is full (capacity {0})")]
    QueueFull(usize),

    #[error("Invalid historical window: {0}")]
    InvalidWindow(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Optimization run was cancelled")]
    Cancelled,

    #[error("Unknown optimization run: {0}")]
    UnknownRun(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

impl FilterOptError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// An in-domain value the evaluated system cannot run with.
    pub fn unusable_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnusableParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Errors caused by one candidate's values, data or runtime. The candidate is
    /// marked unfit (or dropped, for timeouts) and the generation continues.
    pub fn is_candidate_local(&self) -> bool {
        matches!(
            self,
            Self::UnusableParameter { .. }
                | Self::DataGap(_)
                | Self::EmptyCurve
                | Self::InvalidCurve(_)
                | Self::EvaluationTimeout(_)
                | Self::EvaluationPanic(_)
        )
    }

    /// Errors that halt an optimization run.
    pub fn is_systemic(&self) -> bool {
        !self.is_candidate_local() && !matches!(self, Self::Cancelled | Self::QueueFull(_))
    }
}

pub type Result<T> = std::result::Result<T, FilterOptError>;
