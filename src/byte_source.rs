//! Bounded random-access reads over a backing store.
//!
//! Mirrors the teacher crate's choice of `BufReader<File>` for on-disk archives, but exposes
//! positioned `read(offset, length)` instead of a stateful cursor so a [`crate::archive::Archive`]
//! can hand out an [`crate::entry_reader::EntryReader`] while its central-directory index is
//! still being built, without either side fighting over seek position.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use crate::error::{FluxZipError, Result};

/// A cursor-free, random-access window over `N` bytes.
///
/// Implementations must reject reads outside `[0, length())` with
/// [`FluxZipError::OutOfBounds`]. A short read is only acceptable when it would otherwise exceed
/// `length()`; a short read below that is a bug in the backing store.
pub trait ByteSource {
    /// Total number of bytes available.
    fn length(&self) -> u64;

    /// Read exactly `length` bytes starting at `offset`.
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Whether this source supports independent, concurrent positioned reads. The in-memory
    /// buffer does; a bare stateful file handle generally does not without internal
    /// serialization (see [`FileByteSource`], which serializes via an internal lock).
    fn supports_concurrent_reads(&self) -> bool {
        true
    }
}

fn check_bounds(offset: u64, length: u64, source_len: u64) -> Result<()> {
    let end = offset
        .checked_add(length)
        .ok_or(FluxZipError::OutOfBounds {
            offset,
            length,
            source_len,
        })?;
    if end > source_len {
        return Err(FluxZipError::OutOfBounds {
            offset,
            length,
            source_len,
        });
    }
    Ok(())
}

/// Zero-copy-on-read in-memory byte source. Reads slice and clone; no I/O.
#[derive(Clone)]
pub struct MemoryByteSource {
    data: Arc<[u8]>,
}

impl MemoryByteSource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemoryByteSource {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        check_bounds(offset, length, self.length())?;
        let start = offset as usize;
        let end = start + length as usize;
        Ok(self.data[start..end].to_vec())
    }
}

/// File-backed byte source. Holds a single file handle behind a lock so positioned reads from
/// an [`crate::central_directory::CentralDirectoryReader`] and from an open
/// [`crate::entry_reader::EntryReader`] can interleave safely, at the cost of serializing on
/// that lock (the file's seek cursor is not otherwise shareable).
pub struct FileByteSource {
    // `RefCell` rather than a `Mutex`: the library's concurrency model (§5) is single-threaded
    // cooperative, so no cross-thread sharing is attempted here.
    file: RefCell<File>,
    length: u64,
}

impl FileByteSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self {
            file: RefCell::new(file),
            length,
        })
    }

    pub fn from_file(file: File) -> Result<Self> {
        let length = file.metadata()?.len();
        Ok(Self {
            file: RefCell::new(file),
            length,
        })
    }
}

impl ByteSource for FileByteSource {
    fn length(&self) -> u64 {
        self.length
    }

    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        check_bounds(offset, length, self.length)?;
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn supports_concurrent_reads(&self) -> bool {
        // Reads are internally serialized on the RefCell borrow, so from the caller's
        // perspective they are independent, just not concurrent in the parallel sense.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reads_in_bounds() {
        let src = MemoryByteSource::new(Arc::from(&b"hello world"[..]));
        assert_eq!(src.length(), 11);
        assert_eq!(src.read(0, 5).unwrap(), b"hello");
        assert_eq!(src.read(6, 5).unwrap(), b"world");
    }

    #[test]
    fn memory_source_rejects_out_of_bounds() {
        let src = MemoryByteSource::new(Arc::from(&b"hello"[..]));
        assert!(matches!(
            src.read(3, 10),
            Err(FluxZipError::OutOfBounds { .. })
        ));
        assert!(matches!(
            src.read(10, 1),
            Err(FluxZipError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn file_source_reads_match_memory_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let src = FileByteSource::open(&path).unwrap();
        assert_eq!(src.length(), 10);
        assert_eq!(src.read(2, 4).unwrap(), b"2345");
    }
}
