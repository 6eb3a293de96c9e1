//! Synthetic SNANA survey archives.
//!
//! Writes a HEAD/PHOT archive pair whose photometry is drawn from the Bazin
//! model without noise. Useful for exercising the full pipeline without real
//! survey data.

use crate::constants::{FLUXCAL_ZEROPOINT, HEAD_SUFFIX, MAGSYS_AB, PHOT_SUFFIX, columns};
use crate::error::Result;
use crate::fits::{BinTableWriter, ColumnData};
use crate::model::{BazinModel, LightCurveModel};
use crate::normalize::map_band;
use crate::reader::ArchivePair;
use std::path::Path;

/// Phases (observer-frame days from t0) of every synthetic epoch
const EPOCHS: &[f64] = &[-15.0, -10.0, -5.0, 0.0, 5.0, 10.0, 20.0, 30.0, 45.0];

/// One synthetic object
#[derive(Debug, Clone)]
pub struct SyntheticObject {
    pub snid: String,
    pub subsurvey: String,
    pub iauc: String,
    pub redshift: f64,
    pub redshift_err: f64,
    pub t0: f64,
    /// Peak-scale amplitude at zero-point 27.5
    pub amplitude: f64,
    /// Survey band codes observed at every epoch, e.g. `"g "`
    pub bands: Vec<String>,
    /// Flux uncertainty as a fraction of the amplitude, plus one count
    pub noise_fraction: f64,
}

impl SyntheticObject {
    /// A bright, well-sampled object in g, r and i
    pub fn bright(snid: impl Into<String>, redshift: f64) -> Self {
        Self {
            snid: snid.into(),
            subsurvey: "WFD".to_string(),
            iauc: "NULL".to_string(),
            redshift,
            redshift_err: 0.0005,
            t0: 60100.0,
            amplitude: 2000.0,
            bands: vec!["g ".to_string(), "r ".to_string(), "i ".to_string()],
            noise_fraction: 0.02,
        }
    }

    /// An object buried in noise: no epoch reaches S/N 1
    pub fn faint(snid: impl Into<String>, redshift: f64) -> Self {
        Self {
            amplitude: 1.0,
            noise_fraction: 50.0,
            ..Self::bright(snid, redshift)
        }
    }

    pub fn with_bands(mut self, bands: &[&str]) -> Self {
        self.bands = bands.iter().map(|b| b.to_string()).collect();
        self
    }

    fn params(&self) -> Vec<f64> {
        vec![self.redshift, self.t0, self.amplitude, 2.0, 20.0, 0.0]
    }
}

/// Write `<prefix>_HEAD.FITS.gz` and `<prefix>_PHOT.FITS.gz` into `dir`
pub fn write_survey(dir: &Path, prefix: &str, objects: &[SyntheticObject]) -> Result<ArchivePair> {
    let model = BazinModel::new();

    let mut mjd = Vec::new();
    let mut band = Vec::new();
    let mut fluxcal = Vec::new();
    let mut fluxcalerr = Vec::new();
    let mut ptr_min = Vec::new();
    let mut ptr_max = Vec::new();

    for object in objects {
        ptr_min.push(mjd.len() as i32 + 1);
        let params = object.params();
        let sigma = object.noise_fraction * object.amplitude + 1.0;

        for phase in EPOCHS {
            for code in &object.bands {
                let time = object.t0 + phase;
                // Bands the model does not know get a flat, positive flux
                let flux = model
                    .flux(&params, &map_band(code), time, FLUXCAL_ZEROPOINT, MAGSYS_AB)
                    .unwrap_or(object.amplitude * 0.5);
                mjd.push(time);
                band.push(code.clone());
                fluxcal.push(flux as f32);
                fluxcalerr.push(sigma as f32);
            }
        }
        ptr_max.push(mjd.len() as i32);
    }

    let text = |values: Vec<String>, width: usize| ColumnData::Text { width, values };

    let head = BinTableWriter::new()
        .column(
            columns::SUBSURVEY,
            text(objects.iter().map(|o| o.subsurvey.clone()).collect(), 8),
        )
        .column(
            columns::SNID,
            text(objects.iter().map(|o| o.snid.clone()).collect(), 16),
        )
        .column(
            columns::IAUC,
            text(objects.iter().map(|o| o.iauc.clone()).collect(), 16),
        )
        .column(
            columns::REDSHIFT_FINAL,
            ColumnData::Float(objects.iter().map(|o| o.redshift as f32).collect()),
        )
        .column(
            columns::REDSHIFT_FINAL_ERR,
            ColumnData::Float(objects.iter().map(|o| o.redshift_err as f32).collect()),
        )
        .column(columns::PTROBS_MIN, ColumnData::Int(ptr_min))
        .column(columns::PTROBS_MAX, ColumnData::Int(ptr_max));

    let zeropt = vec![31.4f32; mjd.len()];
    let phot = BinTableWriter::new()
        .column(columns::MJD, ColumnData::Double(mjd))
        .column(columns::BAND, text(band, 2))
        .column(columns::FLUXCAL, ColumnData::Float(fluxcal))
        .column(columns::FLUXCALERR, ColumnData::Float(fluxcalerr))
        .column(columns::ZEROPT, ColumnData::Float(zeropt));

    let pair = ArchivePair {
        head: dir.join(format!("{prefix}{HEAD_SUFFIX}.gz")),
        phot: dir.join(format!("{prefix}{PHOT_SUFFIX}.gz")),
    };
    head.write(&pair.head)?;
    phot.write(&pair.phot)?;
    Ok(pair)
}
