pub mod evaluator;
pub mod portfolio;
pub mod system;

pub use evaluator::Evaluator;
pub use portfolio::{Portfolio, Position};
pub use system::{FilterBacktester, SystemParams};
