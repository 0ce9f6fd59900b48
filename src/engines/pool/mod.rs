pub mod task;
pub mod worker_pool;

pub use task::TaskHandle;
pub use worker_pool::{PoolStats, WorkerPool};
