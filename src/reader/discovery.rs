//! Archive discovery for SNANA survey directories
//!
//! A survey directory holds one header archive and one photometry archive
//! sharing a prefix:
//! ```text
//! DC2_run22i_FITS/
//!   DC2_run22i_FITS_HEAD.FITS.gz
//!   DC2_run22i_FITS_PHOT.FITS.gz
//! ```

use crate::constants::{GZIP_EXTENSION, HEAD_SUFFIX, PHOT_SUFFIX};
use crate::error::{LcError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths of a header/photometry archive pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePair {
    pub head: PathBuf,
    pub phot: PathBuf,
}

/// Locates the archive pair inside a survey directory
#[derive(Debug)]
pub struct ArchiveDiscovery {
    data_dir: PathBuf,
    prefix: Option<String>,
}

impl ArchiveDiscovery {
    pub fn new(data_dir: impl Into<PathBuf>, prefix: Option<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prefix,
        }
    }

    /// Find both archives; either one missing is fatal
    pub fn discover(&self) -> Result<ArchivePair> {
        if !self.data_dir.is_dir() {
            return Err(LcError::FileNotFound {
                path: self.data_dir.clone(),
            });
        }

        let head = match &self.prefix {
            Some(prefix) => self.head_for_prefix(prefix)?,
            None => self.single_head_archive()?,
        };

        let phot = phot_partner(&head).ok_or_else(|| {
            LcError::invalid_format(&head, "header archive name does not contain _HEAD.FITS")
        })?;
        if !phot.is_file() {
            return Err(LcError::FileNotFound { path: phot });
        }

        debug!(
            "Found archive pair: {} + {}",
            head.display(),
            phot.display()
        );
        Ok(ArchivePair { head, phot })
    }

    fn head_for_prefix(&self, prefix: &str) -> Result<PathBuf> {
        let compressed = self
            .data_dir
            .join(format!("{prefix}{HEAD_SUFFIX}{GZIP_EXTENSION}"));
        let plain = self.data_dir.join(format!("{prefix}{HEAD_SUFFIX}"));

        if compressed.is_file() {
            Ok(compressed)
        } else if plain.is_file() {
            Ok(plain)
        } else {
            Err(LcError::FileNotFound { path: compressed })
        }
    }

    fn single_head_archive(&self) -> Result<PathBuf> {
        let pattern = format!(
            "{}/*{HEAD_SUFFIX}*",
            glob::Pattern::escape(&self.data_dir.to_string_lossy())
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| LcError::configuration(format!("invalid data directory pattern: {e}")))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| LcError::Io(e.into()))?;
            if is_head_archive(&path) {
                candidates.push(path);
            }
        }
        candidates.sort();

        match candidates.len() {
            0 => Err(LcError::FileNotFound {
                path: self
                    .data_dir
                    .join(format!("*{HEAD_SUFFIX}{GZIP_EXTENSION}")),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(LcError::configuration(format!(
                "found {} header archives in {}; choose one with a prefix: {}",
                candidates.len(),
                self.data_dir.display(),
                candidates
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

fn is_head_archive(path: &Path) -> bool {
    path.is_file()
        && path.file_name().is_some_and(|name| {
            let name = name.to_string_lossy();
            name.ends_with(HEAD_SUFFIX) || name.ends_with(&format!("{HEAD_SUFFIX}{GZIP_EXTENSION}"))
        })
}

/// `X_HEAD.FITS[.gz]` -> `X_PHOT.FITS[.gz]`
fn phot_partner(head: &Path) -> Option<PathBuf> {
    let name = head.file_name()?.to_string_lossy();
    let split = name.rfind(HEAD_SUFFIX)?;
    let phot_name = format!(
        "{}{PHOT_SUFFIX}{}",
        &name[..split],
        &name[split + HEAD_SUFFIX.len()..]
    );
    Some(head.with_file_name(phot_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_phot_partner_keeps_extension() {
        assert_eq!(
            phot_partner(Path::new("/data/RUN_HEAD.FITS.gz")),
            Some(PathBuf::from("/data/RUN_PHOT.FITS.gz"))
        );
        assert_eq!(
            phot_partner(Path::new("RUN_HEAD.FITS")),
            Some(PathBuf::from("RUN_PHOT.FITS"))
        );
        assert_eq!(phot_partner(Path::new("RUN.FITS")), None);
    }

    #[test]
    fn test_discovers_single_pair() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("RUN_HEAD.FITS.gz"), b"").unwrap();
        fs::write(temp_dir.path().join("RUN_PHOT.FITS.gz"), b"").unwrap();

        let pair = ArchiveDiscovery::new(temp_dir.path(), None).discover().unwrap();
        assert!(pair.head.ends_with("RUN_HEAD.FITS.gz"));
        assert!(pair.phot.ends_with("RUN_PHOT.FITS.gz"));
    }

    #[test]
    fn test_missing_phot_archive() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("RUN_HEAD.FITS.gz"), b"").unwrap();

        match ArchiveDiscovery::new(temp_dir.path(), None).discover() {
            Err(LcError::FileNotFound { path }) => {
                assert!(path.ends_with("RUN_PHOT.FITS.gz"));
            }
            other => panic!("Expected FileNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_head_archive() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("RUN_PHOT.FITS.gz"), b"").unwrap();

        let result = ArchiveDiscovery::new(temp_dir.path(), None).discover();
        assert!(matches!(result, Err(LcError::FileNotFound { .. })));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nonexistent");

        match ArchiveDiscovery::new(&missing, None).discover() {
            Err(LcError::FileNotFound { path }) => assert_eq!(path, missing),
            other => panic!("Expected FileNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_without_prefix() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["A_HEAD.FITS.gz", "A_PHOT.FITS.gz", "B_HEAD.FITS", "B_PHOT.FITS"] {
            fs::write(temp_dir.path().join(name), b"").unwrap();
        }

        let result = ArchiveDiscovery::new(temp_dir.path(), None).discover();
        assert!(matches!(result, Err(LcError::Configuration { .. })));

        let pair = ArchiveDiscovery::new(temp_dir.path(), Some("B".to_string()))
            .discover()
            .unwrap();
        assert!(pair.head.ends_with("B_HEAD.FITS"));
        assert!(pair.phot.ends_with("B_PHOT.FITS"));
    }
}
