//! # mmaplog
//!
//! Memory-mapped rotating log sink.
//!
//! This crate provides the write path beneath a structured logging front
//! end: an append-only byte sink that
//! - maps a page-aligned window of the active file into memory and copies
//!   writes straight into it,
//! - grows the window and rotates the file once the configured size limit
//!   is reached, archiving the old file under a timestamped name,
//! - enforces retention (age and count limits) and gzip compaction of
//!   archived files from a debounced background sweeper.
//!
//! The facade consumes it through a narrow sink contract: [`MmapWriter::write`],
//! [`MmapWriter::rotate`] and [`MmapWriter::stop`] (also available as
//! `std::io::Write` on `&MmapWriter`). It owns no knowledge of windows,
//! pages, or sweep policy.
//!
//! ```no_run
//! use mmaplog::{MmapWriter, SinkConfig};
//!
//! let config = SinkConfig::new("/var/log/app/app.log")
//!     .with_max_size_mb(100)
//!     .with_max_backups(10)
//!     .with_compress(true);
//! let writer = MmapWriter::new(config);
//! writer.write(b"hello\n")?;
//! writer.stop()?;
//! # Ok::<(), mmaplog::SinkError>(())
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod sweep;
pub mod window;
pub mod writer;

pub use backup::BackupFile;
pub use config::SinkConfig;
pub use error::SinkError;
pub use sweep::SweepObserver;
pub use writer::MmapWriter;

/// Size of one mapped window (10 MiB). The effective window is capped at
/// the configured maximum file size.
pub const WINDOW_SIZE: u64 = 10 * 1024 * 1024;

/// Page size assumed for window alignment.
pub const PAGE_SIZE: u64 = 4096;

/// One megabyte, the unit of `max_size_mb`.
pub const MEGABYTE: u64 = 1024 * 1024;

/// Default maximum file size in megabytes.
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// Default retention age for archived files, in days.
pub const DEFAULT_MAX_AGE_DAYS: u64 = 30;

/// Default number of archived files to retain.
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// Suffix appended to compressed archived files.
pub const COMPRESS_SUFFIX: &str = ".gz";

/// Timestamp format embedded in archived file names. Fixed width,
/// millisecond precision, no colons (filesystem-safe).
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
