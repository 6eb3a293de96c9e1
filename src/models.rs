//! Core data structures and types for light-curve fitting.
//!
//! Defines raw survey records as read from the archives, normalized light
//! curves, fit results and outcomes, and run statistics.

use crate::constants::columns;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One metadata value from a header-archive row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    /// Raw FITS character data, still padded
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl MetaValue {
    /// Numeric view of the value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Int(v) => Some(*v as f64),
            MetaValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of the value; bytes are decoded, numbers formatted
    pub fn to_text(&self) -> String {
        match self {
            MetaValue::Bytes(bytes) => decode_bytes(bytes),
            MetaValue::Int(v) => v.to_string(),
            MetaValue::Float(v) => v.to_string(),
            MetaValue::Bool(v) => v.to_string(),
        }
    }
}

/// Decode FITS character data to text, dropping trailing padding
pub fn decode_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

/// Ordered per-object metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, MetaValue)>,
}

impl Metadata {
    pub fn new(entries: Vec<(String, MetaValue)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, MetaValue)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&MetaValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Object identifier (`SNID`), decoded
    pub fn snid(&self) -> String {
        self.get(columns::SNID)
            .map(MetaValue::to_text)
            .unwrap_or_default()
    }

    /// Catalog redshift (`REDSHIFT_FINAL`); NaN when absent
    pub fn redshift(&self) -> f64 {
        self.get(columns::REDSHIFT_FINAL)
            .and_then(MetaValue::as_f64)
            .unwrap_or(f64::NAN)
    }
}

/// One photometry row in SNANA naming
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub mjd: f64,
    /// Survey band code as stored, e.g. `"g "`
    pub band: String,
    pub fluxcal: f64,
    pub fluxcalerr: f64,
    pub zeropt: f64,
}

/// An object exactly as read from the archive pair
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub meta: Metadata,
    pub observations: Vec<RawObservation>,
}

/// One photometry point in the fitting convention
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub time: f64,
    pub band: String,
    pub flux: f64,
    pub fluxerr: f64,
    pub zp: f64,
    pub zpsys: String,
}

impl Observation {
    /// Signal-to-noise; zero when the uncertainty is unusable
    pub fn snr(&self) -> f64 {
        if self.fluxerr > 0.0 && self.fluxerr.is_finite() {
            self.flux / self.fluxerr
        } else {
            0.0
        }
    }
}

/// A normalized light curve ready for fitting
#[derive(Debug, Clone, PartialEq)]
pub struct LightCurve {
    pub meta: Metadata,
    pub observations: Vec<Observation>,
}

impl LightCurve {
    pub fn snid(&self) -> String {
        self.meta.snid()
    }

    pub fn redshift(&self) -> f64 {
        self.meta.redshift()
    }
}

/// Fitted parameters of one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: String,
    pub param_names: Vec<String>,
    pub parameters: Vec<f64>,
    pub errors: Vec<f64>,
    /// Mean acceptance fraction over all walkers
    pub acceptance_fraction: f64,
    /// Observations that entered the likelihood
    pub n_obs: usize,
}

impl FitResult {
    /// Value and uncertainty of a named parameter
    pub fn get(&self, name: &str) -> Option<(f64, f64)> {
        self.param_names
            .iter()
            .position(|n| n == name)
            .map(|i| (self.parameters[i], self.errors[i]))
    }
}

/// Terminal state of one object's fit
#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Success(FitResult),
    /// No observation passed the signal-to-noise cut
    DataQuality { min_snr: f64 },
    /// The model or sampler failed
    Runtime { redshift: f64, message: String },
}

impl FitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FitOutcome::Success(_))
    }
}

/// A fit outcome tagged with the object it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFit {
    pub snid: String,
    pub outcome: FitOutcome,
}

/// Processing statistics
#[derive(Debug, Default)]
pub struct RunStats {
    pub objects_read: usize,
    pub fits_succeeded: usize,
    pub data_quality_failures: usize,
    pub runtime_failures: usize,
    pub output_paths: Vec<PathBuf>,
    pub processing_time_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Metadata {
        Metadata::new(vec![
            ("SUBSURVEY".to_string(), MetaValue::Bytes(b"WFD ".to_vec())),
            ("SNID".to_string(), MetaValue::Bytes(b"1234\0\0\0\0".to_vec())),
            ("IAUC".to_string(), MetaValue::Bytes(b"NULL    ".to_vec())),
            ("REDSHIFT_FINAL".to_string(), MetaValue::Float(0.25)),
        ])
    }

    #[test]
    fn test_metadata_accessors_decode_padding() {
        let meta = meta();
        assert_eq!(meta.snid(), "1234");
        assert_eq!(meta.get("SUBSURVEY").map(MetaValue::to_text).as_deref(), Some("WFD"));
        assert_eq!(meta.get("IAUC").map(MetaValue::to_text).as_deref(), Some("NULL"));
        assert_eq!(meta.redshift(), 0.25);
        assert!(meta.get("REDSHIFT_FINAL_ERR").is_none());
    }

    #[test]
    fn test_integer_snid_is_formatted() {
        let meta = Metadata::new(vec![("SNID".to_string(), MetaValue::Int(42))]);
        assert_eq!(meta.snid(), "42");
        assert!(meta.redshift().is_nan());
    }

    #[test]
    fn test_snr_with_bad_uncertainty() {
        let obs = Observation {
            time: 0.0,
            band: "lsstg".to_string(),
            flux: 10.0,
            fluxerr: 0.0,
            zp: 27.5,
            zpsys: "ab".to_string(),
        };
        assert_eq!(obs.snr(), 0.0);
    }
}
