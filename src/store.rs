//! Flat-directory store of downloaded issuer files.
//!
//! The download side (browser automation, issuer sites) lives outside this
//! crate; its only contract with the pipeline is the layout here. Files for
//! ticker `T` sit under `<dir>/T/`, and the pipeline always wants the most
//! recently downloaded one.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

/// Default store directory (relative to the current working directory).
pub const DEFAULT_DB_DIR: &str = "./db";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to scan store directory {path}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct HoldingsStore {
    dir: PathBuf,
}

impl HoldingsStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The most recently modified file downloaded for `ticker`, ties broken
    /// by file name (descending, so date-stamped names pick the newest).
    /// `None` when nothing has been downloaded yet.
    pub fn latest_file_for(&self, ticker: &str) -> Result<Option<PathBuf>, StoreError> {
        let ticker_dir = self.dir.join(ticker);
        if !ticker_dir.is_dir() {
            return Ok(None);
        }

        let scan = |source| StoreError::Scan {
            path: ticker_dir.clone(),
            source,
        };

        let mut files: Vec<(SystemTime, String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&ticker_dir).map_err(scan)? {
            let entry = entry.map_err(scan)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(scan)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push((modified, name, path));
        }

        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        match files.into_iter().next() {
            Some((modified, _, path)) => {
                debug!(
                    "Latest file for {}: {} (modified {})",
                    ticker,
                    path.display(),
                    DateTime::<Utc>::from(modified).format("%Y-%m-%d %H:%M:%S")
                );
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_with_mtime(dir: &Path, name: &str, mtime: SystemTime) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "holdings").unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn test_missing_ticker_is_a_soft_miss() {
        let temp = TempDir::new().unwrap();
        let store = HoldingsStore::new(temp.path());
        assert!(store.latest_file_for("VTI").unwrap().is_none());
    }

    #[test]
    fn test_picks_newest_by_mtime() {
        let temp = TempDir::new().unwrap();
        let ticker_dir = temp.path().join("VTI");
        fs::create_dir_all(&ticker_dir).unwrap();

        let base = SystemTime::now();
        write_with_mtime(&ticker_dir, "vti-old.csv", base - Duration::from_secs(3600));
        let newest = write_with_mtime(&ticker_dir, "vti-new.csv", base);

        let store = HoldingsStore::new(temp.path());
        assert_eq!(store.latest_file_for("VTI").unwrap(), Some(newest));
    }

    #[test]
    fn test_mtime_ties_break_by_name() {
        let temp = TempDir::new().unwrap();
        let ticker_dir = temp.path().join("VTI");
        fs::create_dir_all(&ticker_dir).unwrap();

        let base = SystemTime::now();
        write_with_mtime(&ticker_dir, "vti-20260101.csv", base);
        let later = write_with_mtime(&ticker_dir, "vti-20260201.csv", base);

        let store = HoldingsStore::new(temp.path());
        assert_eq!(store.latest_file_for("VTI").unwrap(), Some(later));
    }
}
