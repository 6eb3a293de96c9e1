//! Light-curve models.
//!
//! A model predicts the flux of an object in a bandpass at a given time from
//! a parameter vector whose first entry is always the redshift `z`. The
//! fitter only talks to [`LightCurveModel`]; template-based models plug in by
//! implementing it and registering in [`model_by_name`].

pub mod bandpass;
pub mod bazin;

pub use bandpass::effective_wavelength;
pub use bazin::BazinModel;

use crate::error::{LcError, Result};
use crate::models::Observation;
use thiserror::Error;

/// Names accepted by [`model_by_name`]
pub const AVAILABLE_MODELS: &[&str] = &[bazin::NAME];

/// Failures while evaluating a model for one observation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("bandpass '{0}' is not defined")]
    UnknownBand(String),

    #[error("magnitude system '{0}' is not supported")]
    UnsupportedMagSystem(String),
}

pub trait LightCurveModel: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Parameter names; `z` comes first
    fn param_names(&self) -> &[&'static str];

    fn supports_band(&self, band: &str) -> bool;

    /// Flux in `band` at `time`, expressed at zero-point `zp` in `zpsys`
    fn flux(
        &self,
        params: &[f64],
        band: &str,
        time: f64,
        zp: f64,
        zpsys: &str,
    ) -> std::result::Result<f64, ModelError>;

    /// Starting point for the sampler
    fn guess(&self, observations: &[Observation], redshift: f64) -> Vec<f64>;

    /// Uniform prior box; `z_bounds` is used for the redshift
    fn bounds(&self, observations: &[Observation], z_bounds: (f64, f64)) -> Vec<(f64, f64)>;
}

/// Look up a model by its identifier (case-insensitive)
pub fn model_by_name(name: &str) -> Result<Box<dyn LightCurveModel>> {
    match name.to_lowercase().as_str() {
        bazin::NAME => Ok(Box::new(BazinModel::new())),
        other => Err(LcError::configuration(format!(
            "unknown model '{other}', available models: {}",
            AVAILABLE_MODELS.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let model = model_by_name("Bazin").unwrap();
        assert_eq!(model.name(), "bazin");
        assert_eq!(model.param_names()[0], "z");
    }

    #[test]
    fn test_unknown_model() {
        let err = model_by_name("salt3").unwrap_err();
        assert!(err.to_string().contains("bazin"));
    }
}
