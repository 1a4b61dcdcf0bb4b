//! The memory-mapped writer.
//!
//! [`MmapWriter`] is the long-lived handle beneath the logging facade. It
//! accepts byte buffers, copies them into a mapped window of the active
//! file, grows the window or rotates the file as data accumulates, and
//! signals the retention sweeper after every rotation.
//!
//! All mutable state lives behind one exclusion lock: at most one thread
//! is inside the write/rotate/stop path at a time, writes are totally
//! ordered by lock acquisition, and accepted bytes land contiguously in
//! call order. The sweeper runs on its own thread and never takes this
//! lock.

use crate::backup;
use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::sweep::{self, SweepObserver, Sweeper};
use crate::window::{self, MappedWindow};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

/// Rotating append-only sink backed by a memory-mapped file.
///
/// The active file and mapping are opened lazily on first write, not at
/// construction. Rotation archives the active file under a timestamped
/// name and starts a fresh one; [`stop`](Self::stop) unmaps and closes
/// without starting a successor.
pub struct MmapWriter {
    config: SinkConfig,
    observer: Option<SweepObserver>,
    state: Mutex<WriterState>,
}

#[derive(Default)]
struct WriterState {
    /// Open active file, if any.
    file: Option<File>,
    /// Physical length of the active file. May exceed `write_at` while a
    /// window is mapped (pre-extended); equals it after every release.
    file_len: u64,
    /// Absolute write cursor; also the logical size of the active file.
    write_at: u64,
    /// Current mapped window, if any. Never more than one per file.
    window: Option<MappedWindow>,
    /// Background sweeper, started once on first need.
    sweeper: Option<Sweeper>,
}

impl MmapWriter {
    /// Creates a writer with the given policy. No file is opened until
    /// the first write.
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            observer: None,
            state: Mutex::new(WriterState::default()),
        }
    }

    /// Installs a callback invoked with the first error of each failed
    /// retention sweep. Sweep errors never propagate to the write path.
    pub fn on_sweep_error(
        mut self,
        observer: impl Fn(&SinkError) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Appends `buf` to the active file.
    ///
    /// Returns the number of bytes accepted (always `buf.len()` on
    /// success). A buffer larger than the maximum file size is rejected
    /// with [`SinkError::WriteTooLarge`], one larger than a whole mapped
    /// window with [`SinkError::WindowOverflow`]; both rejections happen
    /// before any file, mapping or rotation work.
    pub fn write(&self, buf: &[u8]) -> Result<usize, SinkError> {
        let mut state = self.state.lock();
        let state = &mut *state;

        let max = self.config.max_size();
        if buf.len() as u64 > max {
            return Err(SinkError::WriteTooLarge {
                len: buf.len(),
                max,
            });
        }
        // A single write must land inside one mapping. Gated up front:
        // allocating first could rotate the active file for a write that
        // is doomed to fail.
        let capacity = window::window_size(max);
        if buf.len() as u64 > capacity {
            return Err(SinkError::WindowOverflow {
                len: buf.len(),
                capacity: capacity as usize,
            });
        }

        if state.file.is_none() {
            self.open_existing_or_new(state)?;
        }

        let needs_window = match &state.window {
            Some(w) => w.remaining(state.write_at) < buf.len(),
            None => true,
        };
        if needs_window {
            self.allocate_window(state)?;
        }

        let window = state
            .window
            .as_mut()
            .expect("window present after allocation");
        debug_assert!(window.fits(state.write_at, buf.len()));
        window.copy_at(state.write_at, buf);
        state.write_at += buf.len() as u64;
        Ok(buf.len())
    }

    /// Rotates the active file: unmaps, truncates to the exact logical
    /// size, archives it under a timestamped name, starts a fresh file
    /// and signals the sweeper.
    pub fn rotate(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        self.rotate_locked(&mut state)
    }

    /// Unmaps and closes the active file without starting a successor,
    /// then shuts down and joins the sweeper. Idempotent; a later write
    /// re-opens from scratch.
    ///
    /// A write racing with `stop` takes the same lock, so it either
    /// completes first or re-opens after: the last completed write wins.
    pub fn stop(&self) -> Result<(), SinkError> {
        let (result, sweeper) = {
            let mut state = self.state.lock();
            let result = Self::release_window(&mut state);
            state.file = None;
            (result, state.sweeper.take())
        };
        // Joining outside the lock: the sweeper drains any queued sweep
        // before the thread exits.
        if let Some(sweeper) = sweeper {
            sweeper.shutdown();
        }
        result
    }

    /// Flushes the released window and truncates the file down to the
    /// logical size, discarding pre-extended padding. The mapping is
    /// dropped before the file is touched, on every path.
    fn release_window(state: &mut WriterState) -> Result<(), SinkError> {
        let mut flushed = Ok(());
        if let Some(window) = state.window.take() {
            flushed = window.flush();
        }
        if let Some(file) = &state.file {
            if state.file_len != state.write_at {
                file.set_len(state.write_at).map_err(SinkError::Truncate)?;
                state.file_len = state.write_at;
            }
        }
        flushed
    }

    /// Maps a fresh window over the page-aligned floor of the cursor,
    /// rotating first when the window would cross the size limit.
    fn allocate_window(&self, state: &mut WriterState) -> Result<(), SinkError> {
        Self::release_window(state)?;

        let max = self.config.max_size();
        let size = window::window_size(max);
        let mut start = window::page_floor(state.write_at);
        if start + size > max {
            self.rotate_locked(state)?;
            start = 0;
        }

        let file = state
            .file
            .as_ref()
            .expect("active file open during window allocation");
        // Pre-extend so every window address is backed by real storage.
        file.set_len(start + size).map_err(SinkError::Truncate)?;
        state.file_len = start + size;
        state.window = Some(MappedWindow::map(file, start, size as usize)?);
        tracing::debug!("mapped window [{start}, {})", start + size);
        Ok(())
    }

    fn rotate_locked(&self, state: &mut WriterState) -> Result<(), SinkError> {
        Self::release_window(state)?;
        state.file = None;
        self.open_new(state)?;
        self.signal_sweep(state);
        Ok(())
    }

    /// Archives any file at the canonical path and opens a fresh one,
    /// replicating the archived file's ownership onto it.
    fn open_new(&self, state: &mut WriterState) -> Result<(), SinkError> {
        let path = self.config.resolved_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| SinkError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let mut previous = None;
        match std::fs::metadata(&path) {
            Ok(meta) => {
                let target = backup::backup_path(&path, self.config.local_time);
                std::fs::rename(&path, &target).map_err(|source| SinkError::Rename {
                    from: path.clone(),
                    to: target.clone(),
                    source,
                })?;
                tracing::debug!("archived log file as {}", target.display());
                previous = Some(meta);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(SinkError::Stat { path, source }),
        }

        let file = open_active(&path)?;
        if let Some(meta) = previous {
            sweep::replicate_ownership(&meta, &path)?;
        }
        state.file = Some(file);
        state.write_at = 0;
        state.file_len = 0;
        Ok(())
    }

    /// Opens the pre-existing active file, initializing the cursor from
    /// its size, or falls back to a fresh file. Also signals the sweeper
    /// so leftovers from a previous run get pruned.
    fn open_existing_or_new(&self, state: &mut WriterState) -> Result<(), SinkError> {
        self.signal_sweep(state);

        let path = self.config.resolved_path();
        match std::fs::metadata(&path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return self.open_new(state)
            }
            Err(source) => return Err(SinkError::Stat { path, source }),
            Ok(_) => {}
        }

        let file = match open_active(&path) {
            Ok(file) => file,
            Err(_) => return self.open_new(state),
        };
        let len = file
            .metadata()
            .map_err(|source| SinkError::Stat {
                path: path.clone(),
                source,
            })?
            .len();
        state.file = Some(file);
        state.write_at = len;
        state.file_len = len;
        Ok(())
    }

    fn signal_sweep(&self, state: &mut WriterState) {
        let sweeper = state
            .sweeper
            .get_or_insert_with(|| Sweeper::spawn(self.config.clone(), self.observer.clone()));
        sweeper.signal();
    }
}

impl Drop for MmapWriter {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::io::Write for &MmapWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        MmapWriter::write(*self, buf)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let state = self.state.lock();
        if let Some(window) = &state.window {
            window
                .flush()
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
        }
        Ok(())
    }
}

fn open_active(path: &Path) -> Result<File, SinkError> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o664);
    }
    options.open(path).map_err(|source| SinkError::OpenFile {
        path: path.to_path_buf(),
        source,
    })
}
