//! # flux-zip: streaming ZIP reader, writer, and merger
//!
//! `flux-zip` reads, writes, and merges ZIP archives under a bounded-memory contract: no
//! operation materializes a whole archive, a whole central directory, or a whole entry's
//! decompressed contents in memory at once (barring an explicit, caller-chosen cap).
//!
//! ## Features
//!
//! - **Streaming read**: entries are decompressed in caller-sized chunks via [`EntryReader`]
//! - **Streaming write**: [`ArchiveWriter`] is a pull-based byte-chunk producer
//! - **Zero-recompression merge**: [`ArchiveMerger`] copies already-compressed payloads verbatim
//! - **ZIP64**: transparent escalation on both read and write
//!
//! ## Quick start
//!
//! ### Reading an archive
//!
//! ```no_run
//! use flux_zip::{Archive, ArchiveOptions, CompressionRegistry};
//!
//! # fn main() -> flux_zip::Result<()> {
//! let archive = Archive::open_file("archive.zip", ArchiveOptions::default())?;
//! let registry = CompressionRegistry::with_defaults();
//! for entry in archive.entries() {
//!     let entry = entry?;
//!     println!("{}: {} bytes", entry.name(), entry.uncompressed_size());
//! }
//! if let Some(entry) = archive.find("file.txt")? {
//!     let data = entry.read_all(&registry, 64 * 1024 * 1024)?;
//!     println!("read {} bytes", data.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Writing an archive
//!
//! ```no_run
//! use flux_zip::{ArchiveWriter, CompressionRegistry, DataReaderEntrySource, EntrySource, EntrySourceOptions, WriteArchiveOptions};
//!
//! # fn main() -> flux_zip::Result<()> {
//! let mut entries = vec![
//!     DataReaderEntrySource::from_bytes(EntrySourceOptions::new("hello.txt"), b"Hello, World!".to_vec())?,
//! ];
//! let mut writer = ArchiveWriter::new(
//!     move || Ok(entries.pop().map(|e| Box::new(e) as Box<dyn EntrySource>)),
//!     CompressionRegistry::with_defaults(),
//!     WriteArchiveOptions::default(),
//! );
//! let mut out = Vec::new();
//! while let Some(chunk) = writer.next_chunk()? {
//!     out.extend(chunk);
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod byte_source;
pub mod central_directory;
pub mod codec;
pub mod compression;
pub mod constants;
pub mod entry_reader;
pub mod entry_source;
pub mod error;
pub mod extra;
pub mod merger;
pub mod text;
pub mod writer;

pub use archive::{Archive, ArchiveOptions};
pub use byte_source::{ByteSource, FileByteSource, MemoryByteSource};
pub use compression::{CompressionRegistry, DataProcessor};
pub use entry_reader::{EntryDataReader, EntryReader, RawEntryStream};
pub use entry_source::{
    ArchiveEntryEntrySource, DataReaderEntrySource, EntrySource, EntrySourceOptions, RawEntryMetadata, Timestamp,
};
pub use error::{FluxZipError, Result};
pub use extra::ExtraField;
pub use merger::{ArchiveMerger, MergeSource};
pub use writer::{ArchiveWriter, WriteArchiveOptions};
