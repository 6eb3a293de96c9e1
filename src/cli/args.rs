//! Command-line argument definitions for lcfit
//!
//! Every flag is optional so that values from a `--config` file are only
//! overridden by flags the user actually passed.

use crate::config::{FitConfig, FitMode, OutputFormat};
use crate::error::{LcError, Result};
use clap::Parser;
use std::path::PathBuf;

/// Fit supernova light curves from SNANA FITS archives
///
/// Reads the HEAD/PHOT archive pair of a survey directory, fits every light
/// curve with an ensemble MCMC sampler and writes one row per successful fit
/// to `<output_dir>/<model>.FITRES` and/or `.csv`. Objects that cannot be fit
/// are listed in the error log.
#[derive(Debug, Clone, Parser)]
#[command(name = "lcfit", version)]
pub struct Args {
    /// Survey directory containing the _HEAD.FITS / _PHOT.FITS archives
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for the output tables
    #[arg(short = 'o', long = "output-dir", value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Archive name prefix (e.g. DC2_run22i_FITS); discovered when omitted
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Light-curve model
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Maximum number of light curves to fit (0 = all)
    #[arg(short = 'n', long = "max-sn", value_name = "N")]
    pub max_sn: Option<usize>,

    /// Half-width of the redshift window around the catalog redshift
    #[arg(long = "z-width", value_name = "W")]
    pub z_width: Option<f64>,

    /// Minimum signal-to-noise of observations used in the fit
    #[arg(long = "min-snr", value_name = "S")]
    pub min_snr: Option<f64>,

    /// Fitting method
    #[arg(long = "fit-mode", value_enum, value_name = "MODE")]
    pub fit_mode: Option<FitMode>,

    /// Output table format
    #[arg(short = 'f', long = "format", value_enum, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Failure log, truncated at the start of each run
    #[arg(long = "error-log", value_name = "PATH")]
    pub error_log: Option<PathBuf>,

    /// Base random seed
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Ensemble walkers per model parameter
    #[arg(long = "walkers-factor", value_name = "K")]
    pub walkers_factor: Option<usize>,

    /// Burn-in steps per walker
    #[arg(long, value_name = "N")]
    pub burn: Option<usize>,

    /// Post-burn-in steps per walker
    #[arg(long, value_name = "N")]
    pub samples: Option<usize>,

    /// Worker threads for fitting
    #[arg(short = 'j', long, value_name = "JOBS")]
    pub jobs: Option<usize>,

    /// Warn about bands the model does not cover
    #[arg(long)]
    pub warnings: bool,

    /// Print per-object fit diagnostics and the result table
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// JSON configuration file; explicit flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Args {
    /// Build the run configuration: config file (or defaults), then flags
    pub fn into_config(&self) -> Result<FitConfig> {
        let mut config = match &self.config {
            Some(path) => FitConfig::from_json_file(path)?,
            None => FitConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = Some(prefix.clone());
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_sn) = self.max_sn {
            config.max_sn = max_sn;
        }
        if let Some(z_width) = self.z_width {
            config.z_width = z_width;
        }
        if let Some(min_snr) = self.min_snr {
            config.min_snr = min_snr;
        }
        if let Some(mode) = self.fit_mode {
            config.fit_mode = mode;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if let Some(error_log) = &self.error_log {
            config.error_log = error_log.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(factor) = self.walkers_factor {
            config.sampler.walkers_per_param = factor;
        }
        if let Some(burn) = self.burn {
            config.sampler.burn_steps = burn;
        }
        if let Some(samples) = self.samples {
            config.sampler.sample_steps = samples;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        config.warnings |= self.warnings;
        config.verbose |= self.verbose;

        Ok(config)
    }

    /// Tracing level for the crate's own events
    pub fn get_log_level(&self) -> Result<&str> {
        match self.log_level.as_deref() {
            None => Ok("warn"),
            Some(level @ ("error" | "warn" | "info" | "debug" | "trace")) => Ok(level),
            Some(other) => Err(LcError::configuration(format!(
                "unknown log level '{other}', expected error, warn, info, debug or trace"
            ))),
        }
    }
}
