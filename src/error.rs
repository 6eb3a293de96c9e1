//! Error handling for light-curve fitting runs.
//!
//! These are the fatal errors of a run: missing archives, malformed FITS
//! tables, bad configuration and output failures. Per-object fit failures are
//! not errors; they are reported through [`crate::models::FitOutcome`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid format in file: {path} - {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Missing column '{column}' in file: {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Data validation error: {message}")]
    DataValidation { message: String },
}

impl LcError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a data validation error
    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    /// Create an invalid format error for a file
    pub fn invalid_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LcError>;
