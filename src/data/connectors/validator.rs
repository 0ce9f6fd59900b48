use crate::error::{FilterOptError, Result};
use polars::prelude::*;
use std::collections::HashMap;

/// Columns a price frame must provide, under their normalized names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardColumn {
    Timestamp,
    Close,
}

impl StandardColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Close => "close",
        }
    }

    pub fn all() -> [Self; 2] {
        [Self::Timestamp, Self::Close]
    }

    /// Common alternative column names
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Timestamp => &["timestamp", "Timestamp", "time", "datetime", "date", "Date", "DateTime"],
            Self::Close => &["close", "Close", "CLOSE", "c"],
        }
    }
}

pub struct DataValidator;

impl DataValidator {
    /// Map each standard column to the frame's actual column name and check
    /// that the types can be turned into bars.
    pub fn resolve_columns(df: &DataFrame) -> Result<HashMap<StandardColumn, String>> {
        let mut column_map = HashMap::new();

        for required in StandardColumn::all() {
            match Self::find_column(df, required) {
                Some(name) => {
                    column_map.insert(required, name.to_string());
                }
                None => {
                    return Err(FilterOptError::InvalidWindow(format!(
                        "Missing required column: {} (tried aliases: {:?})",
                        required.as_str(),
                        required.aliases()
                    )));
                }
            }
        }

        let close_name = &column_map[&StandardColumn::Close];
        let close = df.column(close_name)?;
        if !matches!(
            close.dtype(),
            DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32
        ) {
            return Err(FilterOptError::InvalidWindow(format!(
                "Column '{}' must be numeric, found {:?}",
                close_name,
                close.dtype()
            )));
        }

        let ts_name = &column_map[&StandardColumn::Timestamp];
        let ts = df.column(ts_name)?;
        if !matches!(
            ts.dtype(),
            DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32 | DataType::Datetime(_, _) | DataType::Date | DataType::String
        ) {
            return Err(FilterOptError::InvalidWindow(format!(
                "Column '{}' must hold epoch milliseconds, dates or datetimes, found {:?}",
                ts_name,
                ts.dtype()
            )));
        }
        if ts.null_count() > 0 {
            return Err(FilterOptError::InvalidWindow(format!(
                "Column '{}' has {} missing timestamps",
                ts_name,
                ts.null_count()
            )));
        }

        Ok(column_map)
    }

    fn find_column(df: &DataFrame, required: StandardColumn) -> Option<&'static str> {
        let columns = df.get_column_names();
        required
            .aliases()
            .iter()
            .find(|&&alias| columns.iter().any(|col| col.as_str() == alias))
            .copied()
    }

    /// Check for minimum required rows
    pub fn validate_minimum_rows(df: &DataFrame, min_rows: usize) -> Result<()> {
        if df.height() < min_rows {
            return Err(FilterOptError::InvalidWindow(format!(
                "Insufficient data: {} rows, minimum {} required",
                df.height(),
                min_rows
            )));
        }
        Ok(())
    }

    /// Null counts per column, for columns that have any.
    pub fn check_nulls(df: &DataFrame) -> Vec<(String, usize)> {
        df.get_columns()
            .iter()
            .filter(|c| c.null_count() > 0)
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect()
    }
}
