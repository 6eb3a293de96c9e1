//! Per-run failure log.
//!
//! The log is truncated when a run starts, opens with a banner naming the
//! tool version and start time, and receives one line per failed fit. Lines
//! are flushed as they are written.

use crate::constants::{TOOL_NAME, TOOL_VERSION};
use crate::error::Result;
use crate::format::format_g;
use crate::models::FitOutcome;
use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    writer: LineWriter<File>,
    entries: usize,
}

impl ErrorLog {
    /// Create (or truncate) the log and write the run banner
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = LineWriter::new(File::create(path)?);
        writeln!(writer, "{}", banner())?;
        debug!("Created error log at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of failure lines written so far
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Append the line for a failed outcome; successes are ignored
    pub fn record(&mut self, snid: &str, outcome: &FitOutcome) -> Result<()> {
        if let Some(line) = failure_line(snid, outcome) {
            writeln!(self.writer, "{line}")?;
            self.entries += 1;
        }
        Ok(())
    }
}

/// First line of every log
pub fn banner() -> String {
    let now = chrono::Local::now();
    format!(
        "Running fits with {TOOL_NAME} {TOOL_VERSION} on {}",
        now.format("%Y-%m-%d %H:%M:%S%.6f")
    )
}

/// Log line describing a failed fit, `None` for a success
pub fn failure_line(snid: &str, outcome: &FitOutcome) -> Option<String> {
    match outcome {
        FitOutcome::Success(_) => None,
        FitOutcome::DataQuality { min_snr } => Some(format!(
            "{snid} has no data with S/N > {min_snr} (data quality)"
        )),
        FitOutcome::Runtime { redshift, message } => Some(format!(
            "{snid} at z = {} had a runtime error: {message}",
            format_g(*redshift, 6)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FitResult;
    use tempfile::TempDir;

    #[test]
    fn test_failure_lines() {
        assert_eq!(
            failure_line("SN2", &FitOutcome::DataQuality { min_snr: 3.0 }).unwrap(),
            "SN2 has no data with S/N > 3 (data quality)"
        );
        assert_eq!(
            failure_line(
                "SN9",
                &FitOutcome::Runtime {
                    redshift: 0.123456789,
                    message: "sampler did not move".to_string()
                }
            )
            .unwrap(),
            "SN9 at z = 0.123457 had a runtime error: sampler did not move"
        );
    }

    #[test]
    fn test_success_is_not_logged() {
        let result = FitResult {
            model: "bazin".to_string(),
            param_names: vec!["z".to_string()],
            parameters: vec![0.1],
            errors: vec![0.001],
            acceptance_fraction: 0.4,
            n_obs: 10,
        };
        assert!(failure_line("SN1", &FitOutcome::Success(result)).is_none());
    }

    #[test]
    fn test_log_is_truncated_and_starts_with_banner() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ERROR.log");
        std::fs::write(&path, "stale content from a previous run\n").unwrap();

        {
            let mut log = ErrorLog::create(&path).unwrap();
            log.record("SN2", &FitOutcome::DataQuality { min_snr: 3.0 })
                .unwrap();
            assert_eq!(log.entries(), 1);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("Running fits with {TOOL_NAME} {TOOL_VERSION} on ")));
        assert!(lines[1].starts_with("SN2 has no data"));
        assert!(!content.contains("stale"));
    }
}
