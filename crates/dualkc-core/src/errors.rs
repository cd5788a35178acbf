use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Error type for configuration, ingest and simulation failures.
///
/// Variants map onto how the driver treats a cell: `Configuration` aborts the
/// whole run before any cell starts, `MissingInputFile` / `MissingField` /
/// `BadUnits` / `DateRangeEmpty` skip the affected cell, and `FatalInternal`
/// marks a cell whose simulation was aborted mid-run.
#[derive(Error, Debug)]
pub enum DualKcError {
    #[error("{0}")]
    Error(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Missing input file {path}: {source}")]
    MissingInputFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Missing required field '{field}' in {table}")]
    MissingField { field: String, table: String },
    #[error("Unrecognised unit '{unit}' for field '{field}'")]
    BadUnits { unit: String, field: String },
    #[error("No rows remain after truncating {table} to [{start}, {end}]")]
    DateRangeEmpty {
        table: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Malformed {table} row {row}: {reason}")]
    Table {
        table: String,
        row: usize,
        reason: String,
    },
    #[error("Invariant violated for cell {cell}, crop {crop} on {date}: {reason}")]
    FatalInternal {
        cell: String,
        crop: u8,
        date: NaiveDate,
        reason: String,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl DualKcError {
    /// Whether the driver treats this error as "skip the cell and go on"
    /// rather than a run- or cell-fatal failure.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            DualKcError::MissingInputFile { .. }
                | DualKcError::MissingField { .. }
                | DualKcError::BadUnits { .. }
                | DualKcError::DateRangeEmpty { .. }
                | DualKcError::Table { .. }
                | DualKcError::Csv(_)
        )
    }
}

/// Convenience type for `Result<T, DualKcError>`.
pub type DualKcResult<T> = Result<T, DualKcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_field_and_table() {
        let err = DualKcError::MissingField {
            field: "etref".to_string(),
            table: "refet daily".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required field 'etref' in refet daily"
        );
    }

    #[test]
    fn fatal_internal_is_not_skippable() {
        let err = DualKcError::FatalInternal {
            cell: "c042".to_string(),
            crop: 3,
            date: NaiveDate::from_ymd_opt(2001, 7, 14).unwrap(),
            reason: "Dr below zero after clamp".to_string(),
        };
        assert!(!err.is_skippable());
        assert!(err.to_string().contains("c042"));
        assert!(err.to_string().contains("2001-07-14"));
    }

    #[test]
    fn ingest_errors_are_skippable() {
        let err = DualKcError::BadUnits {
            unit: "furlongs".to_string(),
            field: "wind".to_string(),
        };
        assert!(err.is_skippable());
    }
}
