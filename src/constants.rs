//! Application constants for the light-curve fitter
//!
//! Tool identity, photometric conventions, SNANA column names and the
//! default values behind [`crate::config::FitConfig`].

// =============================================================================
// Tool Identity
// =============================================================================

/// Name written into output headers and the error-log banner
pub const TOOL_NAME: &str = "LCFIT";

/// Version written into output headers and the error-log banner
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Photometric Conventions
// =============================================================================

/// SNANA FLUXCAL values are calibrated to this zero-point, whatever ZEROPT says
pub const FLUXCAL_ZEROPOINT: f64 = 27.5;

/// Magnitude system assigned to every normalized observation
pub const MAGSYS_AB: &str = "ab";

/// Survey band codes and their fully qualified bandpass names.
///
/// SNANA stores bands as a letter padded with a space; anything not in this
/// table is passed through untouched.
pub const BAND_MAP: &[(&str, &str)] = &[
    ("u ", "lsstu"),
    ("g ", "lsstg"),
    ("r ", "lsstr"),
    ("i ", "lssti"),
    ("z ", "lsstz"),
    ("Y ", "lssty"),
];

/// Effective wavelengths (Angstrom) of the bandpasses known to built-in models
pub const BANDPASS_WAVELENGTHS: &[(&str, f64)] = &[
    ("lsstu", 3671.0),
    ("lsstg", 4827.0),
    ("lsstr", 6223.0),
    ("lssti", 7546.0),
    ("lsstz", 8691.0),
    ("lssty", 9712.0),
];

// =============================================================================
// SNANA Archive Layout
// =============================================================================

/// Suffix marking the header (one row per object) archive
pub const HEAD_SUFFIX: &str = "_HEAD.FITS";

/// Suffix marking the photometry (one row per observation) archive
pub const PHOT_SUFFIX: &str = "_PHOT.FITS";

/// Compressed archive extension
pub const GZIP_EXTENSION: &str = ".gz";

/// SNANA header and photometry column names
pub mod columns {
    pub const SNID: &str = "SNID";
    pub const SUBSURVEY: &str = "SUBSURVEY";
    pub const IAUC: &str = "IAUC";
    pub const REDSHIFT_FINAL: &str = "REDSHIFT_FINAL";
    pub const REDSHIFT_FINAL_ERR: &str = "REDSHIFT_FINAL_ERR";
    pub const PTROBS_MIN: &str = "PTROBS_MIN";
    pub const PTROBS_MAX: &str = "PTROBS_MAX";

    pub const MJD: &str = "MJD";
    pub const BAND: &str = "BAND";
    pub const FLUXCAL: &str = "FLUXCAL";
    pub const FLUXCALERR: &str = "FLUXCALERR";
    pub const ZEROPT: &str = "ZEROPT";
}

// =============================================================================
// Output
// =============================================================================

/// FITRES header marker for the column-name line
pub const FITRES_VARNAMES: &str = "VARNAMES:";

/// FITRES marker prepended to every data row
pub const FITRES_ROW_MARKER: &str = "SN:";

/// Significant figures used for every float written to an output table
pub const OUTPUT_SIG_FIGS: usize = 6;

/// Default error log file name, created in the working directory
pub const DEFAULT_ERROR_LOG: &str = "ERROR.log";

// =============================================================================
// Fit Defaults
// =============================================================================

pub const DEFAULT_MODEL: &str = "bazin";
pub const DEFAULT_MAX_SN: usize = 25;
pub const DEFAULT_Z_WIDTH: f64 = 0.002;
pub const DEFAULT_MIN_SNR: f64 = 3.0;

/// Sampler defaults: walkers per free parameter, burn-in and kept steps
pub const DEFAULT_WALKERS_PER_PARAM: usize = 10;
pub const DEFAULT_BURN_STEPS: usize = 200;
pub const DEFAULT_SAMPLE_STEPS: usize = 1000;

/// Stretch-move scale parameter of the ensemble sampler
pub const STRETCH_SCALE: f64 = 2.0;
