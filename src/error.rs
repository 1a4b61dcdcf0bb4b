//! Sink error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur on the write/rotate path or during a retention
/// sweep.
///
/// Write-path errors are returned with no partial mutation of writer
/// state; the writer stays usable and a later call may re-open and re-map
/// from scratch. Sweep errors never reach a write-path caller.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write of {len} bytes exceeds maximum file size {max}")]
    WriteTooLarge { len: usize, max: u64 },

    #[error("write of {len} bytes exceeds mapped window capacity {capacity}")]
    WindowOverflow { len: usize, capacity: usize },

    #[error("can't create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can't open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can't rename log file {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("mmap failed: {0}")]
    Map(#[source] std::io::Error),

    #[error("unmap flush failed: {0}")]
    Unmap(#[source] std::io::Error),

    #[error("truncate failed: {0}")]
    Truncate(#[source] std::io::Error),

    #[error("can't replicate ownership onto {path}: {source}")]
    Chown {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can't stat {path}: {source}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can't compress log file {path}: {source}")]
    Compress {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can't remove log file {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("can't read log directory {dir}: {source}")]
    ListBackups {
        dir: PathBuf,
        source: std::io::Error,
    },
}
