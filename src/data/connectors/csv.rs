use super::validator::{DataValidator, StandardColumn};
use crate::error::{FilterOptError, Result};
use polars::prelude::*;
use std::path::Path;

pub struct CsvConnector;

impl CsvConnector {
    /// Load CSV file into DataFrame
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
            .finish()
            .map_err(|e| {
                FilterOptError::InvalidWindow(format!(
                    "Failed to read CSV {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;

        Ok(df)
    }

    /// Load a CSV file and rename its timestamp/close columns to the standard names.
    pub fn load_normalized<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let df = Self::load(&path)?;
        DataValidator::validate_minimum_rows(&df, 1)?;
        let df = Self::normalize_columns(df)?;

        let null_report = DataValidator::check_nulls(&df);
        if !null_report.is_empty() {
            log::warn!(
                "Null values detected in {}: {:?}",
                path.as_ref().display(),
                null_report
            );
        }

        Ok(df)
    }

    /// Normalize column names to lowercase standard names
    pub fn normalize_columns(mut df: DataFrame) -> Result<DataFrame> {
        let column_map = DataValidator::resolve_columns(&df)?;

        for required in StandardColumn::all() {
            let actual_name = &column_map[&required];
            let standard_name = required.as_str();
            if actual_name != standard_name {
                df.rename(actual_name, standard_name.into())?;
            }
        }

        Ok(df)
    }
}
