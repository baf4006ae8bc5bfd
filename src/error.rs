//! Error types for flux-zip

use std::io;

/// Result type for flux-zip operations
pub type Result<T> = std::result::Result<T, FluxZipError>;

/// Error types that can occur during ZIP operations.
///
/// This is the error taxonomy, not a type hierarchy: each variant names one failure mode a
/// caller needs to distinguish, not an implementation detail.
#[derive(Debug)]
pub enum FluxZipError {
    /// I/O error from the underlying byte source or writer sink
    Io(io::Error),
    /// Requested read fell outside the byte source's bounds
    OutOfBounds {
        offset: u64,
        length: u64,
        source_len: u64,
    },
    /// No end-of-central-directory record found within the scan window
    NotAZip,
    /// Bad signature, inconsistent lengths, or a local/central header mismatch
    Malformed(String),
    /// Entry not found by name
    EntryNotFound(String),
    /// Compression method has no registered processor
    UnsupportedMethod(u16),
    /// Encrypted entry, spanned archive, or other format feature this crate never implements
    UnsupportedFeature(String),
    /// Decompressed data failed its CRC-32 check
    CrcMismatch { expected: u32, actual: u32 },
    /// A full read would exceed the caller's size cap
    TooLarge { size: u64, cap: u64 },
    /// CP437 encoding was requested but the input has unrepresentable code points
    EncodingUnsupported(String),
    /// The compression backend reported failure
    BackendError(String),
    /// An option value fell outside its documented domain
    InvalidOption(String),
    /// Operation invoked in the wrong phase (e.g. reading chunks before `init()`)
    StateError(String),
}

impl std::fmt::Display for FluxZipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FluxZipError::Io(e) => write!(f, "I/O error: {}", e),
            FluxZipError::OutOfBounds {
                offset,
                length,
                source_len,
            } => write!(
                f,
                "read of {} bytes at offset {} exceeds source length {}",
                length, offset, source_len
            ),
            FluxZipError::NotAZip => write!(f, "end of central directory record not found"),
            FluxZipError::Malformed(msg) => write!(f, "malformed ZIP structure: {}", msg),
            FluxZipError::EntryNotFound(name) => write!(f, "entry not found: {}", name),
            FluxZipError::UnsupportedMethod(method) => {
                write!(f, "unsupported compression method: {}", method)
            }
            FluxZipError::UnsupportedFeature(feature) => {
                write!(f, "unsupported ZIP feature: {}", feature)
            }
            FluxZipError::CrcMismatch { expected, actual } => write!(
                f,
                "CRC-32 mismatch: expected 0x{:08x}, got 0x{:08x}",
                expected, actual
            ),
            FluxZipError::TooLarge { size, cap } => write!(
                f,
                "entry size {} exceeds caller-provided cap of {} bytes",
                size, cap
            ),
            FluxZipError::EncodingUnsupported(name) => {
                write!(f, "cannot encode '{}' as CP437", name)
            }
            FluxZipError::BackendError(msg) => write!(f, "compression backend error: {}", msg),
            FluxZipError::InvalidOption(msg) => write!(f, "invalid option: {}", msg),
            FluxZipError::StateError(msg) => {
                write!(f, "invalid operation for current state: {}", msg)
            }
        }
    }
}

impl std::error::Error for FluxZipError {}

impl From<io::Error> for FluxZipError {
    fn from(err: io::Error) -> Self {
        FluxZipError::Io(err)
    }
}
