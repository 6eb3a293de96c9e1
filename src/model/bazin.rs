//! Redshifted Bazin light-curve model.
//!
//! The rest-frame shape is the Bazin rise/decline profile
//!
//! ```text
//! F(p) = amplitude * exp(-p / tfall) / (1 + exp(-p / trise)),  p = (t - t0) / (1 + z)
//! ```
//!
//! scaled per bandpass by a linear colour law evaluated at the rest-frame
//! effective wavelength `lambda_eff / (1 + z)`. Amplitudes are fluxes at
//! zero-point 27.5 in the AB system.

use super::{LightCurveModel, ModelError, effective_wavelength};
use crate::constants::{FLUXCAL_ZEROPOINT, MAGSYS_AB};
use crate::models::Observation;

pub const NAME: &str = "bazin";

const PARAM_NAMES: &[&str] = &["z", "t0", "amplitude", "trise", "tfall", "c"];

/// Colour law reference wavelength (B band), Angstrom
const REFERENCE_WAVELENGTH: f64 = 4400.0;

const DEFAULT_TRISE: f64 = 3.0;
const DEFAULT_TFALL: f64 = 25.0;

/// Days around the observed range allowed for t0
const T0_MARGIN: f64 = 50.0;

#[derive(Debug, Clone, Default)]
pub struct BazinModel;

impl BazinModel {
    pub fn new() -> Self {
        Self
    }

    /// Rest-frame profile, normalized to amplitude 1
    pub fn shape(phase: f64, trise: f64, tfall: f64) -> f64 {
        let decline = -phase / tfall;
        let rise = -phase / trise;
        // Divide through by exp(rise) when it dominates to avoid inf / inf
        if rise > 0.0 {
            (decline - rise).exp() / ((-rise).exp() + 1.0)
        } else {
            decline.exp() / (1.0 + rise.exp())
        }
    }

    fn colour_factor(c: f64, rest_wavelength: f64) -> f64 {
        10f64.powf(-0.4 * c * (REFERENCE_WAVELENGTH / rest_wavelength - 1.0))
    }
}

impl LightCurveModel for BazinModel {
    fn name(&self) -> &str {
        NAME
    }

    fn param_names(&self) -> &[&'static str] {
        PARAM_NAMES
    }

    fn supports_band(&self, band: &str) -> bool {
        effective_wavelength(band).is_some()
    }

    fn flux(
        &self,
        params: &[f64],
        band: &str,
        time: f64,
        zp: f64,
        zpsys: &str,
    ) -> Result<f64, ModelError> {
        if !zpsys.eq_ignore_ascii_case(MAGSYS_AB) {
            return Err(ModelError::UnsupportedMagSystem(zpsys.to_string()));
        }
        let wavelength =
            effective_wavelength(band).ok_or_else(|| ModelError::UnknownBand(band.to_string()))?;

        let [z, t0, amplitude, trise, tfall, c] = [
            params[0], params[1], params[2], params[3], params[4], params[5],
        ];
        let stretch = 1.0 + z;
        let phase = (time - t0) / stretch;

        let rest_flux = amplitude
            * Self::shape(phase, trise, tfall)
            * Self::colour_factor(c, wavelength / stretch);

        Ok(rest_flux * 10f64.powf(0.4 * (zp - FLUXCAL_ZEROPOINT)))
    }

    fn guess(&self, observations: &[Observation], redshift: f64) -> Vec<f64> {
        let brightest = observations
            .iter()
            .max_by(|a, b| a.flux.total_cmp(&b.flux));

        let (t0, amplitude) = match brightest {
            // Shape is 1/2 at phase zero
            Some(obs) if obs.flux > 0.0 => (obs.time, 2.0 * obs.flux),
            Some(obs) => (obs.time, 1.0),
            None => (0.0, 1.0),
        };

        vec![redshift, t0, amplitude, DEFAULT_TRISE, DEFAULT_TFALL, 0.0]
    }

    fn bounds(&self, observations: &[Observation], z_bounds: (f64, f64)) -> Vec<(f64, f64)> {
        let (t_min, t_max) = observations
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), obs| {
                (lo.min(obs.time), hi.max(obs.time))
            });
        let flux_scale = observations
            .iter()
            .map(|obs| obs.flux.abs())
            .fold(1.0, f64::max);

        vec![
            z_bounds,
            (t_min - T0_MARGIN, t_max + T0_MARGIN),
            (0.0, 1000.0 * flux_scale),
            (0.1, 30.0),
            (1.0, 200.0),
            (-1.0, 3.0),
        ]
    }
}
