//! LCFIT Library
//!
//! Fits supernova light curves from SNANA FITS survey archives.
//!
//! This library provides tools for:
//! - Reading HEAD/PHOT binary-table archive pairs (plain or gzip-compressed)
//! - Normalizing photometry into the fitting convention
//! - Fitting every light curve with an affine-invariant ensemble MCMC sampler
//! - Logging objects that cannot be fit, without stopping the batch
//! - Joining metadata and fit results into a tidy table written as FITRES/CSV

pub mod config;
pub mod constants;
pub mod error;
pub mod error_log;
pub mod fits;
pub mod fitter;
pub mod format;
pub mod model;
pub mod models;
pub mod normalize;
pub mod processor;
pub mod reader;
pub mod sampler;
pub mod simulate;
pub mod tidy;
pub mod writer;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{FitConfig, FitMode, OutputFormat, SamplerConfig};
pub use error::{LcError, Result};
pub use fitter::fit_lc;
pub use models::{FitOutcome, FitResult, LightCurve, ObjectFit, RawRecord, RunStats};
pub use normalize::normalize;
pub use processor::FitProcessor;
pub use reader::read_data;
pub use tidy::combine_and_tidy;
pub use writer::{read_table, save_fits};
