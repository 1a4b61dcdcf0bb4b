//! Retention and compaction sweeper.
//!
//! A single background thread consumes a capacity-one signal channel:
//! rotation signals that arrive while one is already pending collapse
//! into a single sweep (single-flight debounce). The sweeper shares no
//! lock with the write path; it only touches archived files on disk.
//! Sweep failures are logged, handed to the optional observer, and never
//! surfaced to a write-path caller.

use crate::backup::{self, BackupFile};
use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::COMPRESS_SUFFIX;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Callback invoked with the first error of each failed sweep.
pub type SweepObserver = Arc<dyn Fn(&SinkError) + Send + Sync>;

/// Handle to the background sweep thread.
pub(crate) struct Sweeper {
    tx: SyncSender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweep thread. Called once per writer, on first need.
    pub(crate) fn spawn(config: SinkConfig, observer: Option<SweepObserver>) -> Self {
        let (tx, rx) = mpsc::sync_channel::<()>(1);
        let handle = std::thread::spawn(move || {
            while rx.recv().is_ok() {
                if let Err(err) = sweep_once(&config) {
                    tracing::warn!("retention sweep failed: {err}");
                    if let Some(observer) = &observer {
                        observer(&err);
                    }
                }
            }
        });
        Self { tx, handle }
    }

    /// Queues a sweep. A no-op when one is already pending.
    pub(crate) fn signal(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::warn!("sweep thread is gone, signal dropped");
            }
        }
    }

    /// Drains any queued sweep, stops the thread and joins it.
    pub(crate) fn shutdown(self) {
        drop(self.tx);
        if self.handle.join().is_err() {
            tracing::warn!("sweep thread panicked");
        }
    }
}

/// One pass over the archived files: apply the count policy, then the
/// age policy, then compress the survivors. Best-effort and exhaustive;
/// the first error encountered is the one returned.
pub(crate) fn sweep_once(config: &SinkConfig) -> Result<(), SinkError> {
    if !config.sweep_enabled() {
        return Ok(());
    }

    let path = config.resolved_path();
    let mut files = backup::list_backups(&path)?;
    let mut remove = Vec::new();

    if config.max_backups > 0 && files.len() > config.max_backups {
        // A compressed and an uncompressed file with the same base name
        // are one segment and must be kept or dropped together.
        let mut preserved: HashSet<String> = HashSet::new();
        let mut remaining = Vec::new();
        for file in files {
            preserved.insert(file.base_name().to_string());
            if preserved.len() > config.max_backups {
                remove.push(file);
            } else {
                remaining.push(file);
            }
        }
        files = remaining;
    }

    if config.max_age_days > 0 {
        let cutoff =
            backup::sweep_now(config.local_time) - chrono::Duration::days(config.max_age_days as i64);
        let (expired, remaining): (Vec<_>, Vec<_>) =
            files.into_iter().partition(|f| f.timestamp < cutoff);
        remove.extend(expired);
        files = remaining;
    }

    let compress: Vec<&BackupFile> = if config.compress {
        files.iter().filter(|f| !f.compressed).collect()
    } else {
        Vec::new()
    };

    let mut first_err = None;
    let mut removed = 0usize;
    for file in &remove {
        if let Err(err) = fs::remove_file(&file.path).map_err(|source| SinkError::Remove {
            path: file.path.clone(),
            source,
        }) {
            first_err.get_or_insert(err);
        } else {
            removed += 1;
        }
    }

    let mut compressed = 0usize;
    for file in &compress {
        if let Err(err) = compress_file(&file.path) {
            first_err.get_or_insert(err);
        } else {
            compressed += 1;
        }
    }

    if removed > 0 || compressed > 0 {
        tracing::debug!("sweep complete: removed {removed}, compressed {compressed}");
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn compressed_path(src: &Path) -> PathBuf {
    let mut name = src.as_os_str().to_os_string();
    name.push(COMPRESS_SUFFIX);
    PathBuf::from(name)
}

/// Compresses `src` in place to `src.gz`. The source is deleted only
/// after the compressed file is fully written; on any failure the
/// partial destination is deleted and the source left untouched.
fn compress_file(src: &Path) -> Result<(), SinkError> {
    let dst = compressed_path(src);
    if let Err(err) = write_compressed(src, &dst) {
        let _ = fs::remove_file(&dst);
        return Err(err);
    }
    fs::remove_file(src).map_err(|source| SinkError::Remove {
        path: src.to_path_buf(),
        source,
    })
}

fn write_compressed(src: &Path, dst: &Path) -> Result<(), SinkError> {
    let meta = fs::metadata(src).map_err(|source| SinkError::Stat {
        path: src.to_path_buf(),
        source,
    })?;
    let mut input = File::open(src).map_err(|source| SinkError::Compress {
        path: src.to_path_buf(),
        source,
    })?;
    let output = File::create(dst).map_err(|source| SinkError::Compress {
        path: dst.to_path_buf(),
        source,
    })?;

    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut input, &mut encoder).map_err(|source| SinkError::Compress {
        path: src.to_path_buf(),
        source,
    })?;
    encoder.finish().map_err(|source| SinkError::Compress {
        path: dst.to_path_buf(),
        source,
    })?;

    fs::set_permissions(dst, meta.permissions()).map_err(|source| SinkError::Chown {
        path: dst.to_path_buf(),
        source,
    })?;
    replicate_ownership(&meta, dst)?;
    Ok(())
}

/// Replicates unix ownership from the source metadata onto `dst`.
#[cfg(unix)]
pub(crate) fn replicate_ownership(meta: &fs::Metadata, dst: &Path) -> Result<(), SinkError> {
    use std::os::unix::fs::MetadataExt;
    std::os::unix::fs::chown(dst, Some(meta.uid()), Some(meta.gid())).map_err(|source| {
        SinkError::Chown {
            path: dst.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
pub(crate) fn replicate_ownership(_meta: &fs::Metadata, _dst: &Path) -> Result<(), SinkError> {
    Ok(())
}
