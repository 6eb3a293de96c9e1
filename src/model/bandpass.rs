//! Bandpass lookup.

use crate::constants::BANDPASS_WAVELENGTHS;

/// Effective wavelength in Angstrom, if the bandpass is known
pub fn effective_wavelength(band: &str) -> Option<f64> {
    BANDPASS_WAVELENGTHS
        .iter()
        .find(|(name, _)| *name == band)
        .map(|(_, wavelength)| *wavelength)
}
