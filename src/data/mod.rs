pub mod cache;
pub mod connectors;
pub mod provider;
pub mod window;

pub use cache::{IndicatorCache, IndicatorKey};
pub use connectors::{CsvConnector, DataValidator, StandardColumn};
pub use provider::{CsvDataProvider, HistoricalDataProvider, InMemoryDataProvider, WindowRequest};
pub use window::HistoricalWindow;
