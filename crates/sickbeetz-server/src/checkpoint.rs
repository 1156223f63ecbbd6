//! Checkpoint file: the instant of the last successful tick.
//!
//! The file holds a single timestamp in the shared `YYYY-MM-DDTHH:MM:SSZ`
//! layout. A missing file means nothing has been examined yet.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sickbeetz_core::{encode_timestamp, epoch, parse_timestamp};
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// File name used by default inside the data directory.
pub const DEFAULT_CHECKPOINT_FILE: &str = "lastcheck";

/// File-backed checkpoint.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    /// Creates a checkpoint stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the checkpoint file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the checkpoint, defaulting to the epoch when the file is absent.
    pub fn read(&self) -> ServerResult<DateTime<Utc>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint, starting from epoch");
                return Ok(epoch());
            }
            Err(e) => return Err(self.error(format!("failed to read: {}", e))),
        };

        parse_timestamp(&content).map_err(|e| self.error(e.to_string()))
    }

    /// Replaces the checkpoint with `instant`.
    pub fn write(&self, instant: DateTime<Utc>) -> ServerResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| self.error(format!("failed to create directory: {}", e)))?;
        }

        let mut temp_name = self.path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        fs::write(&temp_path, encode_timestamp(&instant))
            .map_err(|e| self.error(format!("failed to write: {}", e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| self.error(format!("failed to replace: {}", e)))?;

        debug!(path = %self.path.display(), checkpoint = %encode_timestamp(&instant), "checkpoint written");
        Ok(())
    }

    fn error(&self, message: String) -> ServerError {
        ServerError::checkpoint(self.path.display().to_string(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_epoch() {
        let dir = tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join(DEFAULT_CHECKPOINT_FILE));
        assert_eq!(checkpoint.read().unwrap(), epoch());
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join(DEFAULT_CHECKPOINT_FILE);
        let checkpoint = Checkpoint::new(&path);

        let instant = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        checkpoint.write(instant).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "2023-01-02T00:00:00Z");
        assert_eq!(checkpoint.read().unwrap(), instant);
        assert!(!dir.path().join("data").join("lastcheck.tmp").exists());
    }

    #[test]
    fn read_tolerates_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CHECKPOINT_FILE);
        fs::write(&path, "2023-01-02T00:00:00Z\n").unwrap();

        let instant = Checkpoint::new(&path).read().unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn garbage_is_a_checkpoint_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CHECKPOINT_FILE);
        fs::write(&path, "last tuesday").unwrap();

        let err = Checkpoint::new(&path).read().unwrap_err();
        assert!(matches!(err, ServerError::Checkpoint { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn write_truncates_subseconds() {
        let dir = tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join(DEFAULT_CHECKPOINT_FILE));
        let instant = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(750);

        checkpoint.write(instant).unwrap();
        assert_eq!(
            checkpoint.read().unwrap(),
            Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
        );
    }
}
