//! Format constants: record signatures and fixed record sizes.
//!
//! All multi-byte integers in a ZIP archive are little-endian; see APPNOTE.TXT sections
//! referenced in each constant's doc comment.

/// Local file header signature (APPNOTE 4.3.7)
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
/// Data descriptor signature (APPNOTE 4.3.9) — optional per spec, always emitted by this writer
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
/// Central directory file header signature (APPNOTE 4.3.12)
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
/// End of central directory record signature (APPNOTE 4.3.16)
pub const EOCD_SIGNATURE: u32 = 0x06054b50;
/// ZIP64 end of central directory record signature (APPNOTE 4.3.14)
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x06064b50;
/// ZIP64 end of central directory locator signature (APPNOTE 4.3.15)
pub const ZIP64_EOCD_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// Fixed-size portion of a local file header, signature through extra-field length.
pub const LOCAL_FILE_HEADER_FIXED_SIZE: u64 = 30;
/// Fixed-size portion of a central directory file header, signature through comment length.
pub const CENTRAL_DIRECTORY_FIXED_SIZE: u64 = 46;
/// Classic (non-ZIP64) end of central directory record size.
pub const EOCD_FIXED_SIZE: u64 = 22;
/// ZIP64 end of central directory record size, not counting its 12-byte signature+size prefix.
pub const ZIP64_EOCD_FIXED_SIZE: u64 = 56;
/// ZIP64 end of central directory locator record size.
pub const ZIP64_EOCD_LOCATOR_SIZE: u64 = 20;
/// Data descriptor size with 32-bit sizes, including the optional signature.
pub const DATA_DESCRIPTOR_SIZE_32: u64 = 16;
/// Data descriptor size with 64-bit (ZIP64) sizes, including the optional signature.
pub const DATA_DESCRIPTOR_SIZE_64: u64 = 24;

/// Maximum EOCD comment length, bounding the backward scan window together with
/// [`EOCD_FIXED_SIZE`].
pub const MAX_EOCD_COMMENT_LEN: u64 = 0xFFFF;

/// Classic field sentinel meaning "see the ZIP64 extra field instead".
pub const ZIP64_SENTINEL_32: u32 = 0xFFFFFFFF;
/// Classic field sentinel for 16-bit entry counts.
pub const ZIP64_SENTINEL_16: u16 = 0xFFFF;

/// Extra field tag: ZIP64 extended information.
pub const EXTRA_TAG_ZIP64: u16 = 0x0001;
/// Extra field tag: Info-ZIP Unicode Path.
pub const EXTRA_TAG_UNICODE_PATH: u16 = 0x7075;
/// Extra field tag: Info-ZIP Unicode Comment.
pub const EXTRA_TAG_UNICODE_COMMENT: u16 = 0x6375;
/// Extra field tag: extended timestamp (mtime/atime/ctime).
pub const EXTRA_TAG_TIMESTAMP: u16 = 0x5455;

/// Compression method: Store (identity).
pub const METHOD_STORE: u16 = 0;
/// Compression method: raw DEFLATE.
pub const METHOD_DEFLATE: u16 = 8;

/// General-purpose bit flag: sizes/CRC live in a trailing data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General-purpose bit flag: name/comment are UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;
/// General-purpose bit flag: entry is encrypted (bit 0).
pub const FLAG_ENCRYPTED: u16 = 1;

/// Default version-needed-to-extract for classic archives.
pub const VERSION_DEFAULT: u16 = 20;
/// Version-needed-to-extract when ZIP64 fields are present.
pub const VERSION_ZIP64: u16 = 45;
/// "Made by" upper byte for Unix-style external attributes (host OS id 3).
pub const MADE_BY_UNIX: u16 = (3 << 8) | VERSION_DEFAULT;

/// Default soft threshold, in bytes, for chunking writer output (see §4.6).
pub const DEFAULT_CHUNK_THRESHOLD: usize = 64 * 1024;
/// Default central-directory read buffer size (see §4.2 / §6).
pub const DEFAULT_CENTRAL_DIRECTORY_BUFFER_SIZE: usize = 64 * 1024;
