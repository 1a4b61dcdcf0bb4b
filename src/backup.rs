//! Archived file naming and listing.
//!
//! Rotated-out files are identified solely by name:
//! `<stem>-<timestamp><ext>[.gz]`, with the timestamp in
//! [`BACKUP_TIMESTAMP_FORMAT`](crate::BACKUP_TIMESTAMP_FORMAT). No
//! in-memory record is kept between sweeps; each sweep re-derives the
//! candidate set from directory contents, and files whose names do not
//! parse are left untouched.

use crate::error::SinkError;
use crate::{BACKUP_TIMESTAMP_FORMAT, COMPRESS_SUFFIX};
use chrono::{Local, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};

/// An archived log file discovered in the log directory.
#[derive(Debug, Clone)]
pub struct BackupFile {
    pub path: PathBuf,
    pub name: String,
    /// Timestamp parsed from the file name. Naive: the format carries no
    /// zone, the naming mode decides how it is interpreted.
    pub timestamp: NaiveDateTime,
    pub compressed: bool,
}

impl BackupFile {
    /// File name with any compressed suffix stripped. A compressed and an
    /// uncompressed file with the same base name are the same log
    /// segment.
    pub fn base_name(&self) -> &str {
        self.name
            .strip_suffix(COMPRESS_SUFFIX)
            .unwrap_or(&self.name)
    }
}

/// Current time in the zone that matches the naming mode.
pub(crate) fn sweep_now(local_time: bool) -> NaiveDateTime {
    if local_time {
        Local::now().naive_local()
    } else {
        Utc::now().naive_utc()
    }
}

/// Splits the active file name into the backup prefix (`<stem>-`) and
/// extension (with leading dot, possibly empty).
pub fn prefix_and_ext(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = match name.rfind('.') {
        Some(at) => name[at..].to_string(),
        None => String::new(),
    };
    let prefix = format!("{}-", &name[..name.len() - ext.len()]);
    (prefix, ext)
}

/// Builds the timestamped backup path for the active file at `path`.
pub fn backup_path(path: &Path, local_time: bool) -> PathBuf {
    let (prefix, ext) = prefix_and_ext(path);
    let timestamp = sweep_now(local_time).format(BACKUP_TIMESTAMP_FORMAT);
    path.with_file_name(format!("{prefix}{timestamp}{ext}"))
}

/// Parses the embedded timestamp from a backup file name, or `None` if
/// the name does not match `<prefix><timestamp><ext>`.
fn timestamp_from_name(name: &str, prefix: &str, ext: &str) -> Option<NaiveDateTime> {
    let rest = name.strip_prefix(prefix)?;
    let stamp = rest.strip_suffix(ext)?;
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()
}

/// Lists archived files for the active file at `path`, newest first.
///
/// Both plain and compressed names are matched; anything else in the
/// directory is ignored.
pub fn list_backups(path: &Path) -> Result<Vec<BackupFile>, SinkError> {
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let (prefix, ext) = prefix_and_ext(path);
    let compressed_ext = format!("{ext}{COMPRESS_SUFFIX}");

    let entries = std::fs::read_dir(&dir).map_err(|source| SinkError::ListBackups {
        dir: dir.clone(),
        source,
    })?;

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SinkError::ListBackups {
            dir: dir.clone(),
            source,
        })?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let parsed = timestamp_from_name(&name, &prefix, &ext)
            .map(|timestamp| (timestamp, false))
            .or_else(|| {
                timestamp_from_name(&name, &prefix, &compressed_ext)
                    .map(|timestamp| (timestamp, true))
            });
        if let Some((timestamp, compressed)) = parsed {
            backups.push(BackupFile {
                path: entry.path(),
                name,
                timestamp,
                compressed,
            });
        }
    }

    // Newest first; name as tie-break for stability within one millisecond.
    backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.name.cmp(&a.name)));
    Ok(backups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn prefix_and_ext_splits_on_last_dot() {
        assert_eq!(
            prefix_and_ext(Path::new("/var/log/app.log")),
            ("app-".to_string(), ".log".to_string())
        );
        assert_eq!(
            prefix_and_ext(Path::new("/var/log/app.2.log")),
            ("app.2-".to_string(), ".log".to_string())
        );
        assert_eq!(
            prefix_and_ext(Path::new("/var/log/app")),
            ("app-".to_string(), String::new())
        );
    }

    #[test]
    fn backup_path_embeds_parseable_timestamp() {
        let backup = backup_path(Path::new("/var/log/app.log"), false);
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("app-"));
        assert!(name.ends_with(".log"));
        assert!(!name.contains(':'));
        assert!(timestamp_from_name(&name, "app-", ".log").is_some());
    }

    #[test]
    fn listing_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("app.log");
        let stamp = "2026-08-20T10-00-00.000";
        let plain = format!("app-{stamp}.log");
        let gz = format!("app-{stamp}.log.gz");
        for name in [
            plain.as_str(),
            gz.as_str(),
            "app.log",
            "app-not-a-timestamp.log",
            "other-2026-08-20T10-00-00.000.log",
            "app-2026-08-20T10-00-00.000.txt",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join(format!("app-{stamp}.log.d"))).unwrap();

        let backups = list_backups(&active).unwrap();
        assert_eq!(backups.len(), 2);
        assert!(backups.iter().any(|b| b.compressed));
        assert!(backups.iter().any(|b| !b.compressed));
        assert_eq!(backups[0].base_name(), backups[1].base_name());
    }

    #[test]
    fn listing_sorts_newest_first() {
        let dir = TempDir::new().unwrap();
        let active = dir.path().join("app.log");
        for stamp in [
            "2026-08-20T10-00-00.000",
            "2026-08-22T10-00-00.500",
            "2026-08-21T10-00-00.250",
        ] {
            std::fs::write(dir.path().join(format!("app-{stamp}.log")), b"x").unwrap();
        }

        let backups = list_backups(&active).unwrap();
        let stamps: Vec<_> = backups.iter().map(|b| b.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(stamps, sorted);
        assert!(backups[0].name.contains("2026-08-22"));
    }

    proptest! {
        #[test]
        fn timestamp_format_round_trips(
            days in 0i64..20_000,
            secs in 0u32..86_400,
            millis in 0u32..1_000,
        ) {
            let date = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()
                + chrono::Duration::days(days);
            let ts = date
                .and_hms_opt(secs / 3600, secs / 60 % 60, secs % 60)
                .unwrap()
                .with_nanosecond(millis * 1_000_000)
                .unwrap();
            let name = format!("app-{}.log", ts.format(BACKUP_TIMESTAMP_FORMAT));
            let parsed = timestamp_from_name(&name, "app-", ".log").unwrap();
            prop_assert_eq!(parsed, ts);
        }
    }
}
