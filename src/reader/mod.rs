//! SNANA archive reader.
//!
//! Loads light-curve records from a header/photometry FITS pair. Each header
//! row is one object; its photometry is the block of PHOT rows between the
//! 1-based, inclusive `PTROBS_MIN`/`PTROBS_MAX` pointers. Records are fully
//! materialized.

pub mod discovery;

pub use discovery::{ArchiveDiscovery, ArchivePair};

use crate::constants::columns;
use crate::error::{LcError, Result};
use crate::fits::{BinTable, FitsValue};
use crate::models::{Metadata, RawObservation, RawRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reader for one archive pair
#[derive(Debug)]
pub struct SnanaReader {
    pair: ArchivePair,
}

impl SnanaReader {
    /// Locate the archive pair in `data_dir`; fails if either file is missing
    pub fn open(data_dir: impl Into<PathBuf>, prefix: Option<String>) -> Result<Self> {
        let pair = ArchiveDiscovery::new(data_dir, prefix).discover()?;
        Ok(Self { pair })
    }

    pub fn from_pair(pair: ArchivePair) -> Self {
        Self { pair }
    }

    pub fn archives(&self) -> &ArchivePair {
        &self.pair
    }

    /// Read at most `max_sn` records (0 reads every record)
    pub fn read(&self, max_sn: usize) -> Result<Vec<RawRecord>> {
        let head = BinTable::read(&self.pair.head)?;
        let phot = BinTable::read(&self.pair.phot)?;

        let head_columns = HeadColumns::locate(&head)?;
        let phot_columns = PhotColumns::locate(&phot)?;

        let count = if max_sn == 0 {
            head.nrows()
        } else {
            head.nrows().min(max_sn)
        };

        let mut records = Vec::with_capacity(count);
        for row in 0..count {
            let meta = read_metadata(&head, &head_columns, row)?;
            let (first, last) = observation_range(&head, &head_columns, row, phot.nrows())?;

            let mut observations = Vec::with_capacity(last - first);
            for phot_row in first..last {
                observations.push(read_observation(&phot, &phot_columns, phot_row)?);
            }

            debug!(
                "Read {} with {} observations",
                meta.snid(),
                observations.len()
            );
            records.push(RawRecord { meta, observations });
        }

        info!(
            "Read {} of {} light curves from {}",
            records.len(),
            head.nrows(),
            self.pair.head.display()
        );
        Ok(records)
    }
}

/// Convenience wrapper: discover the pair in `data_dir` and read it
pub fn read_data(data_dir: &Path, prefix: Option<String>, max_sn: usize) -> Result<Vec<RawRecord>> {
    SnanaReader::open(data_dir, prefix)?.read(max_sn)
}

struct HeadColumns {
    ptrobs_min: usize,
    ptrobs_max: usize,
    /// Scalar columns copied into the metadata, in file order
    meta: Vec<usize>,
}

impl HeadColumns {
    fn locate(head: &BinTable) -> Result<Self> {
        head.require_column(columns::SNID)?;
        head.require_column(columns::REDSHIFT_FINAL)?;
        let ptrobs_min = head.require_column(columns::PTROBS_MIN)?;
        let ptrobs_max = head.require_column(columns::PTROBS_MAX)?;

        let mut meta = Vec::new();
        for (index, def) in head.columns().iter().enumerate() {
            if index == ptrobs_min || index == ptrobs_max {
                continue;
            }
            if !def.is_scalar() {
                debug!("Skipping vector header column {}", def.name);
                continue;
            }
            meta.push(index);
        }

        Ok(Self {
            ptrobs_min,
            ptrobs_max,
            meta,
        })
    }
}

struct PhotColumns {
    mjd: usize,
    band: usize,
    fluxcal: usize,
    fluxcalerr: usize,
    zeropt: Option<usize>,
}

impl PhotColumns {
    fn locate(phot: &BinTable) -> Result<Self> {
        Ok(Self {
            mjd: phot.require_column(columns::MJD)?,
            band: phot.require_column(columns::BAND)?,
            fluxcal: phot.require_column(columns::FLUXCAL)?,
            fluxcalerr: phot.require_column(columns::FLUXCALERR)?,
            zeropt: phot.column_index(columns::ZEROPT),
        })
    }
}

fn read_metadata(head: &BinTable, cols: &HeadColumns, row: usize) -> Result<Metadata> {
    let mut entries = Vec::with_capacity(cols.meta.len());
    for &index in &cols.meta {
        let name = head.columns()[index].name.clone();
        entries.push((name, head.value(row, index)?.into()));
    }
    Ok(Metadata::new(entries))
}

/// Zero-based, half-open PHOT row range of one header row
fn observation_range(
    head: &BinTable,
    cols: &HeadColumns,
    row: usize,
    phot_rows: usize,
) -> Result<(usize, usize)> {
    let pointer = |index: usize, name: &str| -> Result<i64> {
        head.value(row, index)?.as_i64().ok_or_else(|| {
            LcError::invalid_format(head.path(), format!("{name} is not an integer in row {row}"))
        })
    };
    let min = pointer(cols.ptrobs_min, columns::PTROBS_MIN)?;
    let max = pointer(cols.ptrobs_max, columns::PTROBS_MAX)?;

    if min < 1 || max < min - 1 || max as usize > phot_rows {
        return Err(LcError::invalid_format(
            head.path(),
            format!(
                "photometry pointers {min}..={max} in row {row} outside 1..={phot_rows}"
            ),
        ));
    }
    Ok(((min - 1) as usize, max as usize))
}

fn read_observation(phot: &BinTable, cols: &PhotColumns, row: usize) -> Result<RawObservation> {
    let number = |index: usize| -> Result<f64> {
        let value = phot.value(row, index)?;
        value.as_f64().ok_or_else(|| {
            LcError::invalid_format(
                phot.path(),
                format!(
                    "column {} is not numeric in row {row}",
                    phot.columns()[index].name
                ),
            )
        })
    };

    let band = match phot.value(row, cols.band)? {
        value @ FitsValue::Text(_) => value.as_text().unwrap_or_default(),
        _ => {
            return Err(LcError::invalid_format(
                phot.path(),
                format!("{} is not a character column", columns::BAND),
            ));
        }
    };

    Ok(RawObservation {
        mjd: number(cols.mjd)?,
        band,
        fluxcal: number(cols.fluxcal)?,
        fluxcalerr: number(cols.fluxcalerr)?,
        zeropt: match cols.zeropt {
            Some(index) => number(index)?,
            None => f64::NAN,
        },
    })
}

#[cfg(test)]
mod tests;
