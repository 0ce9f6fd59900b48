use super::cache::{IndicatorCache, IndicatorKey};
use super::connectors::{DataValidator, StandardColumn};
use crate::error::{FilterOptError, Result};
use crate::types::Bar;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use std::sync::Arc;

const INDICATOR_CACHE_CAPACITY: usize = 256;

/// An immutable, chronologically ordered slice of one instrument's history.
///
/// Windows are shared read-only between workers behind an `Arc`; the only
/// interior state is the indicator memo, which is internally synchronized.
#[derive(Debug)]
pub struct HistoricalWindow {
    instrument: String,
    bars: Vec<Bar>,
    close: Series,
    indicators: IndicatorCache,
}

impl Clone for HistoricalWindow {
    fn clone(&self) -> Self {
        Self {
            instrument: self.instrument.clone(),
            bars: self.bars.clone(),
            close: self.close.clone(),
            indicators: IndicatorCache::new(INDICATOR_CACHE_CAPACITY),
        }
    }
}

impl HistoricalWindow {
    pub fn new(instrument: impl Into<String>, bars: Vec<Bar>) -> Result<Self> {
        let instrument = instrument.into();
        if bars.is_empty() {
            return Err(FilterOptError::InvalidWindow(format!(
                "window for '{}' has no bars",
                instrument
            )));
        }
        if let Some(i) = bars
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(FilterOptError::InvalidWindow(format!(
                "window for '{}' is not strictly increasing at bar {} ({} then {})",
                instrument,
                i + 1,
                bars[i].timestamp,
                bars[i + 1].timestamp
            )));
        }

        let close = Series::new(
            "close".into(),
            bars.iter().map(|b| b.close).collect::<Vec<Option<f64>>>(),
        );

        Ok(Self {
            instrument,
            bars,
            close,
            indicators: IndicatorCache::new(INDICATOR_CACHE_CAPACITY),
        })
    }

    /// Build a window from a frame with a timestamp column (epoch
    /// milliseconds, dates, datetimes or date strings) and a `close` column.
    /// Other columns are ignored. Null closes become missing bars.
    pub fn from_dataframe(instrument: impl Into<String>, df: &DataFrame) -> Result<Self> {
        let column_map = DataValidator::resolve_columns(df)?;
        let timestamps = timestamps_from_column(df.column(&column_map[&StandardColumn::Timestamp])?)?;

        let close = df
            .column(&column_map[&StandardColumn::Close])?
            .cast(&DataType::Float64)?;
        let close = close.f64()?;

        let bars = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| Bar {
                timestamp,
                close: close.get(i).filter(|c| c.is_finite()),
            })
            .collect();

        Self::new(instrument, bars)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed window; kept for slice-like ergonomics.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.bars[0].timestamp
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.bars[self.bars.len() - 1].timestamp
    }

    pub fn missing_closes(&self) -> usize {
        self.bars.iter().filter(|b| b.close.is_none()).count()
    }

    /// Largest distance between consecutive bars, with the index of the later bar.
    pub fn largest_gap(&self) -> Option<(usize, Duration)> {
        self.bars
            .windows(2)
            .enumerate()
            .map(|(i, pair)| (i + 1, pair[1].timestamp - pair[0].timestamp))
            .max_by_key(|(_, gap)| *gap)
    }

    /// Bars within `[start, end]`; either bound may be open.
    pub fn slice(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        let lo = start.map_or(0, |s| self.bars.partition_point(|b| b.timestamp < s));
        let hi = end.map_or(self.bars.len(), |e| self.bars.partition_point(|b| b.timestamp <= e));
        if lo >= hi {
            return Err(FilterOptError::InvalidWindow(format!(
                "no bars for '{}' between {:?} and {:?}",
                self.instrument, start, end
            )));
        }
        Self::new(self.instrument.clone(), self.bars[lo..hi].to_vec())
    }

    /// Simple moving average of closes ending at each bar. `None` until
    /// `period` bars are available, or when any close in the span is missing.
    pub fn sma(&self, period: usize) -> Result<Arc<[Option<f64>]>> {
        self.indicators
            .get_or_compute(IndicatorKey::Sma(period), || rolling_mean(&self.close, period))
    }
}

fn rolling_mean(close: &Series, period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Ok(vec![None; close.len()]);
    }

    let options = RollingOptionsFixedWindow {
        window_size: period,
        min_periods: period,
        ..Default::default()
    };
    let out = close
        .clone()
        .into_frame()
        .lazy()
        .select([col("close").rolling_mean(options)])
        .collect()?;

    Ok(out.column("close")?.f64()?.into_iter().collect())
}

fn timestamps_from_column(column: &Column) -> Result<Vec<DateTime<Utc>>> {
    let invalid = |i: usize| {
        FilterOptError::InvalidWindow(format!(
            "unreadable timestamp at row {} of column '{}'",
            i,
            column.name()
        ))
    };

    match column.dtype() {
        DataType::String => {
            let values = column.str()?;
            (0..values.len())
                .map(|i| values.get(i).and_then(parse_timestamp).ok_or_else(|| invalid(i)))
                .collect()
        }
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            let days = days.i32()?;
            (0..days.len())
                .map(|i| {
                    days.get(i)
                        .and_then(|d| DateTime::from_timestamp(i64::from(d) * 86_400, 0))
                        .ok_or_else(|| invalid(i))
                })
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = column.cast(&DataType::Int64)?;
            let raw = raw.i64()?;
            (0..raw.len())
                .map(|i| {
                    raw.get(i)
                        .and_then(|v| match unit {
                            TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
                            TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                            TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
                        })
                        .ok_or_else(|| invalid(i))
                })
                .collect()
        }
        _ => {
            let millis = column.cast(&DataType::Int64)?;
            let millis = millis.i64()?;
            (0..millis.len())
                .map(|i| {
                    millis
                        .get(i)
                        .and_then(DateTime::from_timestamp_millis)
                        .ok_or_else(|| invalid(i))
                })
                .collect()
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
