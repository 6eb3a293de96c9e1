//! Tidy table of fit results.
//!
//! One row per successfully fit object, in input order. Metadata and fit
//! results are joined on the object identifier rather than by position, so a
//! failed fit can never shift another object's parameters onto the wrong
//! row.

use crate::error::{LcError, Result};
use crate::models::{FitOutcome, FitResult, LightCurve, MetaValue, ObjectFit};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Storage type of one metadata column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKind {
    Text,
    Int,
    Float,
    Bool,
}

impl MetaKind {
    fn of(value: &MetaValue) -> Self {
        match value {
            MetaValue::Bytes(_) => MetaKind::Text,
            MetaValue::Int(_) => MetaKind::Int,
            MetaValue::Float(_) => MetaKind::Float,
            MetaValue::Bool(_) => MetaKind::Bool,
        }
    }

    /// Common type of two kinds; integers widen to floats, anything else
    /// falls back to text
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (MetaKind::Int, MetaKind::Float) | (MetaKind::Float, MetaKind::Int) => MetaKind::Float,
            _ => MetaKind::Text,
        }
    }
}

/// Prefix of every fit column, e.g. `BAZIN`
pub fn column_prefix(model_name: &str) -> String {
    model_name.to_uppercase()
}

/// Build the tidy table for `model_name`.
///
/// `fits` may contain failures; only successes become rows. Every
/// successful fit must name an object present in `curves`, and no object may
/// be fit twice.
pub fn combine_and_tidy(
    model_name: &str,
    curves: &[LightCurve],
    fits: &[ObjectFit],
) -> Result<DataFrame> {
    let mut by_snid: HashMap<&str, &FitResult> = HashMap::new();
    for fit in fits {
        if let FitOutcome::Success(result) = &fit.outcome {
            if by_snid.insert(fit.snid.as_str(), result).is_some() {
                return Err(LcError::data_validation(format!(
                    "object {} has more than one fit result",
                    fit.snid
                )));
            }
        }
    }

    let snids: Vec<String> = curves.iter().map(LightCurve::snid).collect();
    if let Some(orphan) = by_snid
        .keys()
        .find(|snid| !snids.iter().any(|known| known == *snid))
    {
        return Err(LcError::data_validation(format!(
            "fit result for {orphan} matches no input record"
        )));
    }

    let rows: Vec<(&LightCurve, &FitResult)> = curves
        .iter()
        .zip(&snids)
        .filter_map(|(curve, snid)| by_snid.get(snid.as_str()).map(|fit| (curve, *fit)))
        .collect();

    let mut columns = metadata_columns(curves, &rows);
    columns.extend(fit_columns(model_name, &rows));

    debug!(
        "Tidy table for {}: {} rows, {} columns",
        model_name,
        rows.len(),
        columns.len()
    );
    Ok(DataFrame::new(columns)?)
}

/// Metadata columns in first-seen order across all input records, so the
/// column set does not depend on which fits succeeded
fn metadata_columns(curves: &[LightCurve], rows: &[(&LightCurve, &FitResult)]) -> Vec<Column> {
    let mut layout: Vec<(String, MetaKind)> = Vec::new();
    for curve in curves {
        for (name, value) in curve.meta.entries() {
            let kind = MetaKind::of(value);
            match layout.iter_mut().find(|(known, _)| known == name) {
                Some((_, existing)) => *existing = existing.merge(kind),
                None => layout.push((name.clone(), kind)),
            }
        }
    }

    layout
        .into_iter()
        .map(|(name, kind)| {
            let label = PlSmallStr::from(name.as_str());
            let values = rows.iter().map(|(curve, _)| curve.meta.get(&name));
            match kind {
                MetaKind::Text => Column::new(
                    label,
                    values
                        .map(|v| v.map(MetaValue::to_text))
                        .collect::<Vec<Option<String>>>(),
                ),
                MetaKind::Int => Column::new(
                    label,
                    values
                        .map(|v| match v {
                            Some(MetaValue::Int(i)) => Some(*i),
                            _ => None,
                        })
                        .collect::<Vec<Option<i64>>>(),
                ),
                MetaKind::Float => Column::new(
                    label,
                    values
                        .map(|v| v.and_then(MetaValue::as_f64))
                        .collect::<Vec<Option<f64>>>(),
                ),
                MetaKind::Bool => Column::new(
                    label,
                    values
                        .map(|v| match v {
                            Some(MetaValue::Bool(b)) => Some(*b),
                            _ => None,
                        })
                        .collect::<Vec<Option<bool>>>(),
                ),
            }
        })
        .collect()
}

/// `<P>_<param>` values, then `<P>_<param>_ERR`, then acceptance and
/// observation count
fn fit_columns(model_name: &str, rows: &[(&LightCurve, &FitResult)]) -> Vec<Column> {
    let prefix = column_prefix(model_name);
    let param_names: Vec<String> = match rows.first() {
        Some((_, fit)) => fit.param_names.clone(),
        None => crate::model::model_by_name(model_name)
            .map(|model| model.param_names().iter().map(|p| p.to_string()).collect())
            .unwrap_or_default(),
    };

    let mut columns = Vec::with_capacity(2 * param_names.len() + 2);

    for name in &param_names {
        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|(_, fit)| fit.get(name).map(|(value, _)| value))
            .collect();
        columns.push(Column::new(format!("{prefix}_{name}").into(), values));
    }
    for name in &param_names {
        let errors: Vec<Option<f64>> = rows
            .iter()
            .map(|(_, fit)| fit.get(name).map(|(_, error)| error))
            .collect();
        columns.push(Column::new(format!("{prefix}_{name}_ERR").into(), errors));
    }

    let acceptance: Vec<f64> = rows.iter().map(|(_, fit)| fit.acceptance_fraction).collect();
    columns.push(Column::new(format!("{prefix}_ACCEPTANCE").into(), acceptance));

    let n_obs: Vec<i64> = rows.iter().map(|(_, fit)| fit.n_obs as i64).collect();
    columns.push(Column::new(format!("{prefix}_NOBS").into(), n_obs));

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn curve(snid: &str, redshift: f64) -> LightCurve {
        let mut padded = snid.as_bytes().to_vec();
        padded.resize(8, b' ');
        LightCurve {
            meta: Metadata::new(vec![
                ("SNID".to_string(), MetaValue::Bytes(padded)),
                ("REDSHIFT_FINAL".to_string(), MetaValue::Float(redshift)),
                ("HOSTGAL_NMATCH".to_string(), MetaValue::Int(2)),
            ]),
            observations: Vec::new(),
        }
    }

    fn success(snid: &str, z: f64) -> ObjectFit {
        ObjectFit {
            snid: snid.to_string(),
            outcome: FitOutcome::Success(FitResult {
                model: "bazin".to_string(),
                param_names: vec!["z".to_string(), "t0".to_string()],
                parameters: vec![z, 60000.0],
                errors: vec![0.001, 1.5],
                acceptance_fraction: 0.35,
                n_obs: 14,
            }),
        }
    }

    fn failure(snid: &str) -> ObjectFit {
        ObjectFit {
            snid: snid.to_string(),
            outcome: FitOutcome::DataQuality { min_snr: 3.0 },
        }
    }

    #[test]
    fn test_rows_are_successes_in_input_order() {
        let curves = vec![curve("A", 0.1), curve("B", 0.2), curve("C", 0.3)];
        // Results arrive in a different order than the records
        let fits = vec![success("C", 0.301), failure("B"), success("A", 0.101)];

        let df = combine_and_tidy("bazin", &curves, &fits).unwrap();
        assert_eq!(df.height(), 2);

        let snid = df.column("SNID").unwrap().str().unwrap();
        assert_eq!(snid.get(0), Some("A"));
        assert_eq!(snid.get(1), Some("C"));

        let z = df.column("BAZIN_z").unwrap().f64().unwrap();
        assert_eq!(z.get(0), Some(0.101));
        assert_eq!(z.get(1), Some(0.301));
    }

    #[test]
    fn test_column_order_and_types() {
        let curves = vec![curve("A", 0.1)];
        let df = combine_and_tidy("bazin", &curves, &[success("A", 0.1)]).unwrap();

        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "SNID",
                "REDSHIFT_FINAL",
                "HOSTGAL_NMATCH",
                "BAZIN_z",
                "BAZIN_t0",
                "BAZIN_z_ERR",
                "BAZIN_t0_ERR",
                "BAZIN_ACCEPTANCE",
                "BAZIN_NOBS",
            ]
        );
        assert_eq!(df.column("SNID").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("HOSTGAL_NMATCH").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("BAZIN_t0_ERR").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_no_successes_keeps_full_column_set() {
        let curves = vec![curve("A", 0.1)];
        let df = combine_and_tidy("bazin", &curves, &[failure("A")]).unwrap();
        assert_eq!(df.height(), 0);
        assert!(df.column("BAZIN_amplitude_ERR").is_ok());
        assert!(df.column("SNID").is_ok());
    }

    #[test]
    fn test_duplicate_fit_is_rejected() {
        let curves = vec![curve("A", 0.1)];
        let err = combine_and_tidy("bazin", &curves, &[success("A", 0.1), success("A", 0.2)])
            .unwrap_err();
        assert!(matches!(err, LcError::DataValidation { .. }));
    }

    #[test]
    fn test_orphan_fit_is_rejected() {
        let curves = vec![curve("A", 0.1)];
        let err = combine_and_tidy("bazin", &curves, &[success("Z", 0.1)]).unwrap_err();
        assert!(err.to_string().contains("Z"));
    }
}
