use super::connectors::CsvConnector;
use super::window::HistoricalWindow;
use crate::error::{FilterOptError, Result};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Which slice of history an optimization run replays against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    pub instrument: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl WindowRequest {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            start: None,
            end: None,
        }
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    fn check_bounds(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(FilterOptError::InvalidWindow(format!(
                    "window start {} is after end {}",
                    start, end
                )));
            }
        }
        Ok(())
    }
}

/// Source of historical price series, owned by the persistence layer.
pub trait HistoricalDataProvider: Send + Sync {
    fn load_window(&self, request: &WindowRequest) -> Result<HistoricalWindow>;
}

fn window_from_frame(request: &WindowRequest, df: &DataFrame) -> Result<HistoricalWindow> {
    request.check_bounds()?;
    let window = HistoricalWindow::from_dataframe(request.instrument.clone(), df)?;
    if request.start.is_none() && request.end.is_none() {
        return Ok(window);
    }
    window.slice(request.start, request.end)
}

/// Frames held in memory, keyed by instrument.
#[derive(Default)]
pub struct InMemoryDataProvider {
    frames: HashMap<String, DataFrame>,
}

impl InMemoryDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, instrument: impl Into<String>, df: DataFrame) -> Self {
        self.insert(instrument, df);
        self
    }

    pub fn insert(&mut self, instrument: impl Into<String>, df: DataFrame) {
        self.frames.insert(instrument.into(), df);
    }
}

impl HistoricalDataProvider for InMemoryDataProvider {
    fn load_window(&self, request: &WindowRequest) -> Result<HistoricalWindow> {
        let df = self.frames.get(&request.instrument).ok_or_else(|| {
            FilterOptError::InvalidWindow(format!("no data for instrument '{}'", request.instrument))
        })?;
        window_from_frame(request, df)
    }
}

/// Reads `<root>/<instrument>.csv` on every request.
pub struct CsvDataProvider {
    root: PathBuf,
}

impl CsvDataProvider {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, instrument: &str) -> PathBuf {
        self.root.join(format!("{}.csv", instrument))
    }
}

impl HistoricalDataProvider for CsvDataProvider {
    fn load_window(&self, request: &WindowRequest) -> Result<HistoricalWindow> {
        let path = self.path_for(&request.instrument);
        if !path.is_file() {
            return Err(FilterOptError::InvalidWindow(format!(
                "no data file for instrument '{}' at {}",
                request.instrument,
                path.display()
            )));
        }
        log::debug!("Loading {} from {}", request.instrument, path.display());
        let df = CsvConnector::load_normalized(&path)?;
        window_from_frame(request, &df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use std::io::Write;

    const T0: i64 = 1_704_067_200_000;
    const HOUR: i64 = 3_600_000;

    fn frame() -> DataFrame {
        df! {
            "timestamp" => &[T0, T0 + HOUR, T0 + 2 * HOUR, T0 + 3 * HOUR],
            "close" => &[10.0, 11.0, 12.0, 13.0],
        }
        .unwrap()
    }

    #[test]
    fn in_memory_slices_to_bounds() {
        let provider = InMemoryDataProvider::new().with_frame("ETH", frame());
        let request = WindowRequest::new("ETH").between(
            DateTime::from_timestamp_millis(T0 + HOUR).unwrap(),
            DateTime::from_timestamp_millis(T0 + 2 * HOUR).unwrap(),
        );
        let window = provider.load_window(&request).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.bars()[0].close, Some(11.0));
    }

    #[test]
    fn unknown_instrument_is_an_error() {
        let provider = InMemoryDataProvider::new();
        assert!(provider.load_window(&WindowRequest::new("XRP")).is_err());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let provider = InMemoryDataProvider::new().with_frame("ETH", frame());
        let request = WindowRequest::new("ETH").between(
            DateTime::from_timestamp_millis(T0 + HOUR).unwrap(),
            DateTime::from_timestamp_millis(T0).unwrap(),
        );
        assert!(matches!(
            provider.load_window(&request),
            Err(FilterOptError::InvalidWindow(_))
        ));
    }

    #[test]
    fn csv_provider_reads_instrument_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("SPY.csv")).unwrap();
        writeln!(file, "Date,Close").unwrap();
        writeln!(file, "2024-01-01,470.1").unwrap();
        writeln!(file, "2024-01-02,472.6").unwrap();
        writeln!(file, "2024-01-03,468.9").unwrap();
        drop(file);

        let provider = CsvDataProvider::new(dir.path());
        let window = provider.load_window(&WindowRequest::new("SPY")).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window.bars()[2].close, Some(468.9));
    }
}
