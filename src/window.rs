//! Mapped window management.
//!
//! A [`MappedWindow`] is an owned, page-aligned read-write mapping over a
//! byte range of the active file. It is the unit of remap: the writer
//! holds at most one window at a time, releases it (flush, unmap,
//! truncate) before any rotation or close, and never lets a mapping
//! outlive the file handle it was created from.

use crate::error::SinkError;
use crate::{PAGE_SIZE, WINDOW_SIZE};
use memmap2::{MmapMut, MmapOptions};
use std::fs::File;

/// Rounds an offset down to the containing page boundary.
pub fn page_floor(offset: u64) -> u64 {
    offset / PAGE_SIZE * PAGE_SIZE
}

/// Effective window size for a given maximum file size.
///
/// The window constant is a working set smaller than the file's maximum
/// size; when the maximum is smaller than the constant, the window is
/// capped so rotation still triggers at the configured limit.
pub fn window_size(max_size: u64) -> u64 {
    WINDOW_SIZE.min(max_size)
}

/// An owned mapping over `[start, start + len)` of the active file.
pub struct MappedWindow {
    mmap: MmapMut,
    start: u64,
}

impl MappedWindow {
    /// Maps `len` bytes of `file` starting at the page-aligned `start`.
    ///
    /// The caller must have extended the file to at least `start + len`
    /// beforehand so every address in the window is backed by real
    /// storage.
    pub fn map(file: &File, start: u64, len: usize) -> Result<Self, SinkError> {
        debug_assert_eq!(start % PAGE_SIZE, 0, "window start must be page-aligned");
        // Safety: the writer lock serializes all access to this mapping,
        // and the file has been pre-extended to cover the full range.
        let mmap = unsafe { MmapOptions::new().offset(start).len(len).map_mut(file) }
            .map_err(SinkError::Map)?;
        Ok(Self { mmap, start })
    }

    /// Absolute file offset where the window begins.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Window capacity in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Absolute file offset one past the window.
    pub fn end(&self) -> u64 {
        self.start + self.mmap.len() as u64
    }

    /// Bytes left between the absolute `cursor` and the window end.
    pub fn remaining(&self, cursor: u64) -> usize {
        self.end().saturating_sub(cursor) as usize
    }

    /// Whether a write of `len` bytes at the absolute `cursor` lies
    /// entirely inside the window.
    pub fn fits(&self, cursor: u64, len: usize) -> bool {
        cursor >= self.start && self.remaining(cursor) >= len
    }

    /// Copies `buf` into the window at the absolute `cursor`. The caller
    /// must have checked [`fits`](Self::fits) first.
    pub fn copy_at(&mut self, cursor: u64, buf: &[u8]) {
        debug_assert!(self.fits(cursor, buf.len()));
        let at = (cursor - self.start) as usize;
        self.mmap[at..at + buf.len()].copy_from_slice(buf);
    }

    /// Flushes dirty pages to the backing file.
    pub fn flush(&self) -> Result<(), SinkError> {
        self.mmap.flush().map_err(SinkError::Unmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn page_floor_alignment() {
        assert_eq!(page_floor(0), 0);
        assert_eq!(page_floor(1), 0);
        assert_eq!(page_floor(4095), 0);
        assert_eq!(page_floor(4096), 4096);
        assert_eq!(page_floor(10_000), 8192);
    }

    #[test]
    fn window_size_is_capped_by_max() {
        assert_eq!(window_size(1024 * 1024), 1024 * 1024);
        assert_eq!(window_size(u64::MAX), WINDOW_SIZE);
    }

    #[test]
    fn copy_lands_in_backing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.log");
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();
        file.set_len(2 * PAGE_SIZE).unwrap();

        let mut window = MappedWindow::map(&file, 0, 2 * PAGE_SIZE as usize).unwrap();
        assert!(window.fits(100, 5));
        window.copy_at(100, b"hello");
        window.flush().unwrap();
        drop(window);

        let mut contents = Vec::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(&contents[100..105], b"hello");
    }

    #[test]
    fn mapping_at_nonzero_page_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.log");
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();
        file.set_len(3 * PAGE_SIZE).unwrap();

        let mut window = MappedWindow::map(&file, PAGE_SIZE, PAGE_SIZE as usize).unwrap();
        assert_eq!(window.start(), PAGE_SIZE);
        assert_eq!(window.end(), 2 * PAGE_SIZE);
        assert_eq!(window.remaining(PAGE_SIZE + 10), PAGE_SIZE as usize - 10);
        assert!(!window.fits(2 * PAGE_SIZE - 1, 2));

        window.copy_at(PAGE_SIZE, b"x");
        window.flush().unwrap();
        drop(window);

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(contents[PAGE_SIZE as usize], b'x');
    }
}
