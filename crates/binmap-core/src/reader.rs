//! Random-access, bounded reads over a file.
//!
//! `PagedReader` memory-maps the file when possible and falls back to
//! positioned buffered reads; the choice is invisible to callers.
//! Reads past end-of-file return a truncated (possibly empty) buffer.

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

enum Backend {
    Mmap(Mmap),
    // Positioned reads need exclusive access to the seek cursor
    Buffered(Mutex<File>),
}

/// Random-access reader over a single file.
///
/// Thread-safe: the mmap backend shares an immutable mapping, the
/// buffered backend serializes seeks behind a mutex. The file handle
/// is held for the reader's lifetime and released on drop.
pub struct PagedReader {
    backend: Backend,
    size: u64,
    path: PathBuf,
}

impl PagedReader {
    /// Open a file, preferring a memory map.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(path, true)
    }

    /// Open a file, optionally forcing the buffered backend.
    #[allow(unsafe_code)]
    pub fn with_options(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        // Mapping a zero-length file is rejected on several platforms
        let backend = if use_mmap && size > 0 {
            // SAFETY: the mapping is read-only and lives as long as the
            // file handle held by Mmap itself.
            match unsafe { Mmap::map(&file) } {
                Ok(map) => Backend::Mmap(map),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "mmap failed, using buffered reads");
                    Backend::Buffered(Mutex::new(file))
                }
            }
        } else {
            Backend::Buffered(Mutex::new(file))
        };

        Ok(Self {
            backend,
            size,
            path: path.to_path_buf(),
        })
    }

    /// Total file size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path this reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read up to `n` bytes at `offset`. Requests past end-of-file are
    /// truncated; an offset at or beyond EOF yields an empty buffer.
    pub fn read(&self, offset: u64, n: usize) -> Result<Vec<u8>> {
        Ok(self.slice(offset, n)?.into_owned())
    }

    /// Borrow up to `n` bytes at `offset` where the backend allows it
    /// (mmap); the buffered backend returns an owned copy.
    pub fn slice(&self, offset: u64, n: usize) -> Result<Cow<'_, [u8]>> {
        let end = offset
            .checked_add(n as u64)
            .ok_or(Error::InvalidOffset {
                offset,
                length: n as u64,
            })?;
        if offset >= self.size || n == 0 {
            return Ok(Cow::Borrowed(&[]));
        }
        let end = end.min(self.size);
        let len = (end - offset) as usize;

        match &self.backend {
            Backend::Mmap(map) => Ok(Cow::Borrowed(&map[offset as usize..offset as usize + len])),
            Backend::Buffered(file) => {
                let mut guard = file.lock();
                guard.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; len];
                let mut filled = 0;
                while filled < len {
                    let got = guard.read(&mut buf[filled..])?;
                    if got == 0 {
                        break;
                    }
                    filled += got;
                }
                buf.truncate(filled);
                Ok(Cow::Owned(buf))
            }
        }
    }

    /// Single byte at `offset`, or `None` at/past end-of-file.
    pub fn byte_at(&self, offset: u64) -> Result<Option<u8>> {
        if offset >= self.size {
            return Ok(None);
        }
        Ok(self.slice(offset, 1)?.first().copied())
    }
}

impl std::fmt::Debug for PagedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedReader")
            .field("path", &self.path)
            .field("size", &self.size)
            .field(
                "backend",
                &match self.backend {
                    Backend::Mmap(_) => "mmap",
                    Backend::Buffered(_) => "buffered",
                },
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(size: usize) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        f.write_all(&data).unwrap();
        f.flush().unwrap();
        f
    }

    fn open_both(path: &Path) -> [PagedReader; 2] {
        [
            PagedReader::with_options(path, true).unwrap(),
            PagedReader::with_options(path, false).unwrap(),
        ]
    }

    #[test]
    fn test_read_exact_ranges() {
        let f = fixture(5000);
        for r in open_both(f.path()) {
            assert_eq!(r.read(0, 16).unwrap(), (0u8..16).collect::<Vec<_>>());

            let expected: Vec<u8> = (1234..1234 + 77).map(|i| (i % 256) as u8).collect();
            assert_eq!(r.read(1234, 77).unwrap(), expected);
        }
    }

    #[test]
    fn test_read_past_eof_truncated() {
        let f = fixture(4097);
        for r in open_both(f.path()) {
            let start = r.size() - 10;
            let out = r.read(start, 100).unwrap();
            assert_eq!(out.len(), 10);

            assert_eq!(r.read(r.size(), 10).unwrap(), Vec::<u8>::new());
            assert_eq!(r.read(r.size() + 50, 10).unwrap(), Vec::<u8>::new());
        }
    }

    #[test]
    fn test_byte_at_behavior() {
        let f = fixture(1024);
        for r in open_both(f.path()) {
            assert_eq!(r.byte_at(0).unwrap(), Some(0));
            assert_eq!(r.byte_at(255).unwrap(), Some(255));
            assert_eq!(r.byte_at(256).unwrap(), Some(0));
            assert_eq!(r.byte_at(r.size()).unwrap(), None);
        }
    }

    #[test]
    fn test_repeated_reads_stable() {
        let f = fixture(2048);
        for r in open_both(f.path()) {
            let a = r.read(100, 64).unwrap();
            let b = r.read(100, 64).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let r = PagedReader::open(f.path()).unwrap();
        assert_eq!(r.size(), 0);
        assert_eq!(r.read(0, 8).unwrap(), Vec::<u8>::new());
        assert_eq!(r.byte_at(0).unwrap(), None);
    }

    #[test]
    fn test_file_not_found() {
        let err = PagedReader::open("/definitely/not/here.bin").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_overflowing_request_rejected() {
        let f = fixture(64);
        let r = PagedReader::open(f.path()).unwrap();
        assert!(matches!(
            r.read(u64::MAX, 2),
            Err(Error::InvalidOffset { .. })
        ));
    }
}
