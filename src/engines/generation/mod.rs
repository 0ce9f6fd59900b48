pub mod candidate;
pub mod comparator;
pub mod diversity;
pub mod evolution_engine;
pub mod fitness;
pub mod fitness_cache;
pub mod hall_of_fame;
pub mod hooks;
pub mod operators;
pub mod parameter_space;
pub mod population;
pub mod progress;
pub mod status;
pub mod strategy;

pub use candidate::Candidate;
pub use comparator::RunComparator;
pub use diversity::population_diversity;
pub use evolution_engine::{GenerationRecord, OptimizationEngine, RunOutcome};
pub use fitness::Fitness;
pub use fitness_cache::FitnessCache;
pub use hall_of_fame::HallOfFame;
pub use hooks::{
    ChannelNotifier, Checkpoint, CheckpointSink, ConvergedFilter, ConvergenceNotifier,
    JsonlCheckpointSink, MemoryCheckpointSink,
};
pub use parameter_space::{FilterParameterSpace, ParamValue, ParameterDef, ParameterDomain};
pub use population::{EvaluatedCandidate, Population};
pub use progress::{
    ChannelProgressCallback, LoggingProgressCallback, NoProgress, ProgressCallback,
    ProgressMessage,
};
pub use status::{CancellationToken, RunState, RunStatus, StatusBoard};
pub use strategy::{ProposalInput, SearchStrategy};
