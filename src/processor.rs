//! End-to-end fitting run.
//!
//! Orchestrates the complete workflow for one survey: archive discovery and
//! reading, normalization, per-object fitting with failure logging, tidy
//! aggregation and table output.

use crate::config::FitConfig;
use crate::error::Result;
use crate::error_log::ErrorLog;
use crate::fitter::fit_lc;
use crate::model::model_by_name;
use crate::models::{FitOutcome, RunStats};
use crate::normalize::normalize;
use crate::reader::SnanaReader;
use crate::tidy::combine_and_tidy;
use crate::writer::save_fits;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{debug, info};

/// Runs one configured fit over a survey directory
#[derive(Debug)]
pub struct FitProcessor {
    config: FitConfig,
}

impl FitProcessor {
    /// Create a processor; the configuration is validated here so that bad
    /// settings fail before any archive is touched
    pub fn new(config: FitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Main processing entry point
    pub fn process(&self) -> Result<RunStats> {
        let start_time = Instant::now();
        let config = &self.config;
        let model = model_by_name(&config.model)?;

        println!("{}", "Starting light-curve fits".bright_green().bold());
        println!("  {} {}", "Data:".bright_cyan(), config.data_dir.display());
        println!("  {} {}", "Model:".bright_cyan(), model.name());
        println!(
            "  {} {} ({})",
            "Output:".bright_cyan(),
            config.output_stem().display(),
            config.output_format
        );

        // Step 1: locate and read the archive pair
        println!("\n{}", "Reading survey archives...".bright_yellow());
        let reader = SnanaReader::open(&config.data_dir, config.prefix.clone())?;
        let archives = reader.archives();
        debug!(
            "Archive pair: {} / {}",
            archives.head.display(),
            archives.phot.display()
        );
        let records = reader.read(config.max_sn)?;
        println!(
            "  {} {} light curves",
            "Read".bright_green(),
            records.len().to_string().bright_white().bold()
        );

        // Step 2: normalize into the fitting convention
        let curves: Vec<_> = records.iter().map(normalize).collect();
        debug!("Normalized {} light curves", curves.len());

        // Step 3: fit, logging failures as they are reported
        let mut error_log = ErrorLog::create(&config.error_log)?;
        println!(
            "\n{} {} {}",
            "Fitting with".bright_yellow(),
            config.jobs,
            if config.jobs == 1 { "thread" } else { "threads" }
        );

        let progress = ProgressBar::new(curves.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        let fits = fit_lc(model.as_ref(), &curves, config, &mut error_log, &progress)?;
        progress.finish_with_message("Fits complete");

        // Step 4: tidy and write
        let table = combine_and_tidy(model.name(), &curves, &fits)?;
        if config.verbose {
            println!("{table}");
        }

        println!("\n{}", "Writing results...".bright_yellow());
        let output_paths = save_fits(&table, &config.output_stem(), config.output_format)?;
        for path in &output_paths {
            println!("  {} {}", "Wrote".bright_green(), path.display());
        }

        let mut stats = RunStats {
            objects_read: records.len(),
            output_paths,
            processing_time_ms: start_time.elapsed().as_millis(),
            ..RunStats::default()
        };
        for fit in &fits {
            match fit.outcome {
                FitOutcome::Success(_) => stats.fits_succeeded += 1,
                FitOutcome::DataQuality { .. } => stats.data_quality_failures += 1,
                FitOutcome::Runtime { .. } => stats.runtime_failures += 1,
            }
        }

        info!(
            "Fit {} of {} objects ({} failures logged to {})",
            stats.fits_succeeded,
            stats.objects_read,
            error_log.entries(),
            error_log.path().display()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FitMode, SamplerConfig};
    use crate::error::LcError;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_unimplemented_fit_mode() {
        let config = FitConfig::default().with_fit_mode(FitMode::MaxLikelihood);
        let err = FitProcessor::new(config).unwrap_err();
        assert!(matches!(err, LcError::Configuration { .. }));
    }

    #[test]
    fn test_missing_data_dir_fails_before_log_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("ERROR.log");
        let config = FitConfig::default()
            .with_data_dir(temp_dir.path().join("missing"))
            .with_output_dir(temp_dir.path())
            .with_error_log(&log)
            .with_sampler(SamplerConfig {
                walkers_per_param: 4,
                burn_steps: 10,
                sample_steps: 10,
            });

        let err = FitProcessor::new(config).unwrap().process().unwrap_err();
        assert!(matches!(err, LcError::FileNotFound { .. }));
        assert!(!log.exists());
    }
}
