pub mod optimization_runner;

pub use optimization_runner::{OptimizationService, RunHandle};
