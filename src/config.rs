//! Configuration management and validation.
//!
//! Every run is driven by one [`FitConfig`] passed explicitly into the reader,
//! fitter and writer. Configs can be loaded from JSON and are validated up
//! front so that bad settings fail before any archive is opened.

use crate::constants::{
    DEFAULT_BURN_STEPS, DEFAULT_ERROR_LOG, DEFAULT_MAX_SN, DEFAULT_MIN_SNR, DEFAULT_MODEL,
    DEFAULT_SAMPLE_STEPS, DEFAULT_WALKERS_PER_PARAM, DEFAULT_Z_WIDTH,
};
use crate::error::{LcError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How model parameters are estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Ensemble MCMC sampling
    #[default]
    Mcmc,
    /// Maximum-likelihood optimisation (not implemented)
    #[value(alias = "maxlike")]
    #[serde(alias = "maxlike")]
    MaxLikelihood,
}

/// Output table formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// SNANA FITRES table
    Fitres,
    /// Comma-separated table
    Csv,
    /// FITRES and CSV
    #[default]
    Both,
}

impl OutputFormat {
    pub fn writes_fitres(&self) -> bool {
        matches!(self, OutputFormat::Fitres | OutputFormat::Both)
    }

    pub fn writes_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Fitres => "fitres",
            OutputFormat::Csv => "csv",
            OutputFormat::Both => "both",
        };
        write!(f, "{name}")
    }
}

/// Ensemble sampler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Walkers per free parameter
    pub walkers_per_param: usize,

    /// Steps discarded at the start of every walker
    pub burn_steps: usize,

    /// Steps kept per walker after burn-in
    pub sample_steps: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            walkers_per_param: DEFAULT_WALKERS_PER_PARAM,
            burn_steps: DEFAULT_BURN_STEPS,
            sample_steps: DEFAULT_SAMPLE_STEPS,
        }
    }
}

/// Settings for one fitting run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Light-curve model identifier (see [`crate::model::model_by_name`])
    pub model: String,

    /// Directory holding the HEAD/PHOT archive pair
    pub data_dir: PathBuf,

    /// Archive name prefix, e.g. `DC2_run22i_FITS`; discovered when absent
    pub prefix: Option<String>,

    /// Directory receiving `<model>.FITRES` / `<model>.csv`
    pub output_dir: PathBuf,

    /// Maximum number of objects to read (0 = all)
    pub max_sn: usize,

    /// Half-width of the redshift window around the catalog redshift
    pub z_width: f64,

    /// Minimum signal-to-noise for an observation to be fit
    pub min_snr: f64,

    /// Log warnings about dropped bands
    pub warnings: bool,

    /// Print per-object fit diagnostics
    pub verbose: bool,

    pub fit_mode: FitMode,

    pub output_format: OutputFormat,

    /// Per-run failure log, truncated at start
    pub error_log: PathBuf,

    pub sampler: SamplerConfig,

    /// Base seed; object `i` of the batch samples with `seed + i`
    pub seed: u64,

    /// Worker threads for fitting (1 = sequential)
    pub jobs: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            data_dir: PathBuf::from("."),
            prefix: None,
            output_dir: PathBuf::from("."),
            max_sn: DEFAULT_MAX_SN,
            z_width: DEFAULT_Z_WIDTH,
            min_snr: DEFAULT_MIN_SNR,
            warnings: false,
            verbose: false,
            fit_mode: FitMode::Mcmc,
            output_format: OutputFormat::Both,
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            sampler: SamplerConfig::default(),
            seed: 0,
            jobs: 1,
        }
    }
}

impl FitConfig {
    /// Load a config from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LcError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => LcError::Io(e),
        })?;
        let config: FitConfig = serde_json::from_str(&text)
            .map_err(|e| LcError::invalid_format(path, format!("invalid config JSON: {e}")))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_error_log(mut self, error_log: impl Into<PathBuf>) -> Self {
        self.error_log = error_log.into();
        self
    }

    pub fn with_max_sn(mut self, max_sn: usize) -> Self {
        self.max_sn = max_sn;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_fit_mode(mut self, fit_mode: FitMode) -> Self {
        self.fit_mode = fit_mode;
        self
    }

    /// Output path without extension: `<output_dir>/<model>`
    pub fn output_stem(&self) -> PathBuf {
        self.output_dir.join(&self.model)
    }

    /// Check every setting that can be checked without touching the data
    pub fn validate(&self) -> Result<()> {
        if self.fit_mode == FitMode::MaxLikelihood {
            return Err(LcError::configuration(
                "maximum-likelihood fitting is not implemented; use the 'mcmc' fit mode",
            ));
        }

        crate::model::model_by_name(&self.model)?;

        if !(self.z_width.is_finite() && self.z_width > 0.0) {
            return Err(LcError::configuration(format!(
                "redshift window half-width must be positive, got {}",
                self.z_width
            )));
        }
        if !self.min_snr.is_finite() || self.min_snr < 0.0 {
            return Err(LcError::configuration(format!(
                "minimum signal-to-noise must be non-negative, got {}",
                self.min_snr
            )));
        }
        if self.sampler.walkers_per_param < 2 {
            return Err(LcError::configuration(
                "the ensemble sampler needs at least 2 walkers per parameter",
            ));
        }
        if self.sampler.sample_steps == 0 {
            return Err(LcError::configuration("sample steps must be > 0"));
        }
        if self.jobs == 0 {
            return Err(LcError::configuration("jobs must be > 0"));
        }

        Ok(())
    }
}
