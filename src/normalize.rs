//! Record normalization.
//!
//! Converts raw SNANA photometry into the fitting convention: flux columns
//! under their standard names, every zero-point replaced by the FLUXCAL
//! zero-point, AB magnitudes and fully qualified bandpass names. The raw
//! record is left untouched.

use crate::constants::{BAND_MAP, FLUXCAL_ZEROPOINT, MAGSYS_AB};
use crate::models::{LightCurve, Observation, RawRecord};

/// Normalize one raw record into a new light curve
pub fn normalize(record: &RawRecord) -> LightCurve {
    let observations = record
        .observations
        .iter()
        .map(|raw| Observation {
            time: raw.mjd,
            band: map_band(&raw.band),
            flux: raw.fluxcal,
            fluxerr: raw.fluxcalerr,
            // ZEROPT is meaningless for FLUXCAL; it is replaced, not rescaled
            zp: FLUXCAL_ZEROPOINT,
            zpsys: MAGSYS_AB.to_string(),
        })
        .collect();

    LightCurve {
        meta: record.meta.clone(),
        observations,
    }
}

/// Map a survey band code (`"g "`) to its bandpass name (`"lsstg"`).
///
/// Codes outside the table are returned unchanged, so mapping an already
/// mapped name is a no-op.
pub fn map_band(code: &str) -> String {
    BAND_MAP
        .iter()
        .find(|(survey, _)| *survey == code)
        .map(|(_, bandpass)| bandpass.to_string())
        .unwrap_or_else(|| code.to_string())
}
