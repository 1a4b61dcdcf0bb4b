//! Sink configuration.
//!
//! The sink does not load configuration itself; an external loader
//! deserializes into [`SinkConfig`] (all fields have defaults) or builds
//! one with the `with_*` methods.

use crate::{DEFAULT_MAX_AGE_DAYS, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_SIZE_MB, MEGABYTE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Policy fields consumed by [`MmapWriter`](crate::MmapWriter) at
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Path of the active log file. `None` falls back to
    /// `<temp_dir>/<process name>-mmap.log`.
    pub path: Option<PathBuf>,
    /// Maximum file size in megabytes before rotation. `0` means the
    /// default (100).
    pub max_size_mb: u64,
    /// Maximum age in days of archived files, based on the timestamp
    /// encoded in their names. `0` disables age-based retention.
    pub max_age_days: u64,
    /// Maximum number of archived files to retain. `0` disables
    /// count-based retention.
    pub max_backups: usize,
    /// Use local time instead of UTC in archived file names.
    pub local_time: bool,
    /// Gzip archived files during sweeps.
    pub compress: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            max_backups: DEFAULT_MAX_BACKUPS,
            local_time: false,
            compress: false,
        }
    }
}

impl SinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_max_size_mb(mut self, mb: u64) -> Self {
        self.max_size_mb = mb;
        self
    }

    pub fn with_max_age_days(mut self, days: u64) -> Self {
        self.max_age_days = days;
        self
    }

    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    pub fn with_local_time(mut self, local: bool) -> Self {
        self.local_time = local;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Maximum file size in bytes.
    pub fn max_size(&self) -> u64 {
        if self.max_size_mb == 0 {
            DEFAULT_MAX_SIZE_MB * MEGABYTE
        } else {
            self.max_size_mb * MEGABYTE
        }
    }

    /// Returns the configured path, or the per-process default under the
    /// system temp directory.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let process = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "mmaplog".to_string());
        std::env::temp_dir().join(format!("{process}-mmap.log"))
    }

    /// Whether any retention or compaction policy is active.
    pub(crate) fn sweep_enabled(&self) -> bool {
        self.max_backups > 0 || self.max_age_days > 0 || self.compress
    }
}
