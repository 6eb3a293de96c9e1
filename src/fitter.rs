//! Per-object light-curve fitting.
//!
//! [`Fitter::fit_one`] turns one normalized light curve into a
//! [`FitOutcome`]; it never fails, so one bad object cannot stop a batch.
//! [`fit_lc`] runs a whole batch, optionally on a rayon pool, and then
//! reports every outcome in input order to the console and the error log.

use crate::config::FitConfig;
use crate::error::{LcError, Result};
use crate::error_log::{ErrorLog, failure_line};
use crate::format::format_g;
use crate::model::LightCurveModel;
use crate::models::{FitOutcome, FitResult, LightCurve, ObjectFit, Observation};
use crate::sampler::EnsembleSampler;
use colored::*;
use indicatif::ProgressBar;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Fits light curves with one model and one configuration
#[derive(Debug)]
pub struct Fitter<'a> {
    model: &'a dyn LightCurveModel,
    config: &'a FitConfig,
}

impl<'a> Fitter<'a> {
    pub fn new(model: &'a dyn LightCurveModel, config: &'a FitConfig) -> Self {
        Self { model, config }
    }

    /// Fit object number `index` of the batch; the index seeds its RNG
    pub fn fit_one(&self, curve: &LightCurve, index: usize) -> FitOutcome {
        let snid = curve.snid();
        let redshift = curve.redshift();
        let runtime = |message: String| FitOutcome::Runtime { redshift, message };

        if !redshift.is_finite() {
            return runtime("catalog redshift is not finite".to_string());
        }
        let z_bounds = (
            (redshift - self.config.z_width).max(0.0),
            redshift + self.config.z_width,
        );
        if z_bounds.1 <= 0.0 {
            return runtime(format!(
                "redshift window [{}, {}] lies at or below zero",
                format_g(redshift - self.config.z_width, 6),
                format_g(z_bounds.1, 6)
            ));
        }

        let supported = self.supported_observations(&snid, &curve.observations);
        if supported.is_empty() {
            return runtime(format!(
                "no observations in bandpasses covered by model {}",
                self.model.name()
            ));
        }

        let observations: Vec<Observation> = supported
            .into_iter()
            .filter(|obs| obs.snr() > self.config.min_snr)
            .collect();
        if observations.is_empty() {
            return FitOutcome::DataQuality {
                min_snr: self.config.min_snr,
            };
        }

        let ndim = self.model.param_names().len();
        if observations.len() < ndim {
            return runtime(format!(
                "only {} observations with S/N > {} for {} free parameters",
                observations.len(),
                self.config.min_snr,
                ndim
            ));
        }

        let bounds = self.model.bounds(&observations, z_bounds);
        let guess: Vec<f64> = self
            .model
            .guess(&observations, redshift)
            .into_iter()
            .zip(&bounds)
            .map(|(value, (lo, hi))| value.clamp(*lo, *hi))
            .collect();

        // Surface model errors (unknown bandpass, magnitude system) once,
        // before the sampler sees them as -inf
        if let Err(err) = chi_squared(self.model, &guess, &observations) {
            return runtime(err);
        }

        let log_prob = |params: &[f64]| match chi_squared(self.model, params, &observations) {
            Ok(chi2) => -0.5 * chi2,
            Err(_) => f64::NEG_INFINITY,
        };

        let sampler = EnsembleSampler::new(ndim, &self.config.sampler);
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(index as u64));

        debug!(
            "Sampling {} with {} walkers over {} observations",
            snid,
            sampler.nwalkers(),
            observations.len()
        );

        match sampler.run(log_prob, &guess, &bounds, &mut rng) {
            Ok(summary) => FitOutcome::Success(FitResult {
                model: self.model.name().to_string(),
                param_names: self
                    .model
                    .param_names()
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
                parameters: summary.mean,
                errors: summary.std,
                acceptance_fraction: summary.acceptance_fraction,
                n_obs: observations.len(),
            }),
            Err(err) => runtime(err.to_string()),
        }
    }

    /// Fit every curve; the result keeps input order
    pub fn fit_all(&self, curves: &[LightCurve], progress: &ProgressBar) -> Result<Vec<ObjectFit>> {
        let fit = |(index, curve): (usize, &LightCurve)| {
            let snid = curve.snid();
            progress.set_message(format!("Fitting {snid}"));
            let outcome = self.fit_one(curve, index);
            progress.inc(1);
            ObjectFit { snid, outcome }
        };

        if self.config.jobs <= 1 {
            return Ok(curves.iter().enumerate().map(fit).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()
            .map_err(|e| LcError::configuration(format!("cannot start fitting threads: {e}")))?;
        Ok(pool.install(|| curves.par_iter().enumerate().map(fit).collect()))
    }

    fn supported_observations(&self, snid: &str, observations: &[Observation]) -> Vec<Observation> {
        let (supported, dropped): (Vec<&Observation>, Vec<&Observation>) = observations
            .iter()
            .partition(|obs| self.model.supports_band(&obs.band));

        if self.config.warnings && !dropped.is_empty() {
            let bands: BTreeSet<&str> = dropped.iter().map(|obs| obs.band.as_str()).collect();
            warn!(
                "Dropping following bands from data for {}: {:?}",
                snid, bands
            );
        }

        supported.into_iter().cloned().collect()
    }
}

fn chi_squared(
    model: &dyn LightCurveModel,
    params: &[f64],
    observations: &[Observation],
) -> std::result::Result<f64, String> {
    let mut chi2 = 0.0;
    for obs in observations {
        let predicted = model
            .flux(params, &obs.band, obs.time, obs.zp, &obs.zpsys)
            .map_err(|e| e.to_string())?;
        let pull = (obs.flux - predicted) / obs.fluxerr;
        chi2 += pull * pull;
    }
    if chi2.is_finite() {
        Ok(chi2)
    } else {
        Err(format!("chi-squared is not finite for parameters {params:?}"))
    }
}

/// Fit a batch, report failures in input order and return every outcome.
///
/// Failed objects are written to the console and `error_log`; they never
/// abort the batch. Only I/O on the log itself is fatal.
pub fn fit_lc(
    model: &dyn LightCurveModel,
    curves: &[LightCurve],
    config: &FitConfig,
    error_log: &mut ErrorLog,
    progress: &ProgressBar,
) -> Result<Vec<ObjectFit>> {
    let fits = Fitter::new(model, config).fit_all(curves, progress)?;

    for (curve, fit) in curves.iter().zip(&fits) {
        if let Some(line) = failure_line(&fit.snid, &fit.outcome) {
            let styled = match fit.outcome {
                FitOutcome::DataQuality { .. } => line.yellow(),
                _ => line.red(),
            };
            progress.println(format!("{styled}"));
            error_log.record(&fit.snid, &fit.outcome)?;
        }

        if config.verbose {
            if let FitOutcome::Success(result) = &fit.outcome {
                progress.println(verbose_report(&fit.snid, curve.redshift(), result));
            }
        }
    }

    Ok(fits)
}

/// Catalog vs fitted redshift and every parameter of one fit
pub fn verbose_report(snid: &str, catalog_redshift: f64, result: &FitResult) -> String {
    let mut lines = vec![
        snid.to_string(),
        "---------------".to_string(),
        format!("input redshift: {}", format_g(catalog_redshift, 6)),
        String::new(),
    ];
    for ((name, value), error) in result
        .param_names
        .iter()
        .zip(&result.parameters)
        .zip(&result.errors)
    {
        lines.push(format!(
            "{name}: {} +/ {}",
            format_g(*value, 3),
            format_g(*error, 2)
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}
