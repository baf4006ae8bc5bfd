//! Producer abstraction yielding one output entry's headers and a lazy byte stream (§3, §4.7).

use std::io::Read;

use flate2::Compression;

use crate::codec::pack_dos_datetime;
use crate::constants::{METHOD_DEFLATE, VERSION_DEFAULT, VERSION_ZIP64};
use crate::entry_reader::{EntryReader, RawEntryStream};
use crate::error::{FluxZipError, Result};
use crate::extra::ExtraField;

/// A calendar moment, used for `modTime`/`acTime`/`crTime` (§6, EntrySource options).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Unix epoch seconds, used for the extended-timestamp extra field; DOS date/time alone
    /// can't represent sub-1980 or post-2107 dates or sub-2-second resolution.
    pub unix_time: u32,
}

impl Timestamp {
    pub fn dos_date_time(&self) -> (u16, u16) {
        pack_dos_datetime(self.year, self.month, self.day, self.hour, self.minute, self.second)
    }
}

/// Requested options for one output entry (§6, "EntrySource" options).
#[derive(Debug, Clone)]
pub struct EntrySourceOptions {
    pub file_name: String,
    pub file_comment: String,
    pub force_utf8_file_name: bool,
    pub compression_method: u16,
    pub compression_level: Compression,
    pub force_zip64: bool,
    pub min_made_by_version: u16,
    pub min_extraction_version: u16,
    pub mod_time: Option<Timestamp>,
    pub ac_time: Option<u32>,
    pub cr_time: Option<u32>,
    pub unicode_file_name_field: bool,
    pub unicode_comment_field: bool,
    pub extended_timestamp_field: bool,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
}

impl Default for EntrySourceOptions {
    fn default() -> Self {
        Self {
            file_name: String::new(),
            file_comment: String::new(),
            force_utf8_file_name: false,
            compression_method: METHOD_DEFLATE,
            compression_level: Compression::default(),
            force_zip64: false,
            min_made_by_version: VERSION_DEFAULT,
            min_extraction_version: VERSION_DEFAULT,
            mod_time: None,
            ac_time: None,
            cr_time: None,
            unicode_file_name_field: false,
            unicode_comment_field: false,
            extended_timestamp_field: true,
            internal_file_attributes: 0,
            external_file_attributes: 0,
        }
    }
}

impl EntrySourceOptions {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// Validates option values against their documented domain, rejecting the rest (§7,
    /// `InvalidOption`).
    pub fn validate(&self) -> Result<()> {
        if self.file_name.is_empty() {
            return Err(FluxZipError::InvalidOption("file_name must not be empty".into()));
        }
        if self.min_extraction_version > VERSION_ZIP64 && !self.force_zip64 {
            return Err(FluxZipError::InvalidOption(
                "min_extraction_version above the ZIP64 baseline requires force_zip64".into(),
            ));
        }
        Ok(())
    }
}

/// Authoritative metadata a raw-copy source reports instead of letting the writer compute it
/// (§4.7, `ArchiveEntryEntrySource`: "the writer bypasses recompression and CRC recomputation").
#[derive(Debug, Clone)]
pub struct RawEntryMetadata {
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Extra-field entries to re-emit verbatim, minus local-only timestamp components, exactly
    /// as copied from the source entry (§8 property 8).
    pub extra_fields: Vec<ExtraField>,
}

/// Producer abstraction yielding one output entry's headers and a lazy byte stream (§3).
pub trait EntrySource {
    fn options(&self) -> &EntrySourceOptions;

    /// Pulls the next chunk of this entry's body.
    ///
    /// For an ordinary entry this yields *uncompressed* bytes destined for the writer's
    /// compression processor. For a raw-copy entry ([`is_raw_copy`] returning `true`) it yields
    /// already-compressed bytes to be copied through verbatim.
    ///
    /// [`is_raw_copy`]: EntrySource::is_raw_copy
    fn next_chunk(&mut self, max_len: usize) -> Result<Option<Vec<u8>>>;

    /// Whether [`next_chunk`](EntrySource::next_chunk) yields already-compressed bytes that must
    /// bypass the compression registry and CRC recomputation.
    fn is_raw_copy(&self) -> bool {
        false
    }

    /// For raw-copy sources, the authoritative metadata to trust instead of computing it.
    fn raw_metadata(&self) -> Option<&RawEntryMetadata> {
        None
    }
}

/// Wraps a user byte source; the writer applies the requested compression method.
pub struct DataReaderEntrySource {
    options: EntrySourceOptions,
    reader: Box<dyn Read>,
}

impl DataReaderEntrySource {
    pub fn new(options: EntrySourceOptions, reader: impl Read + 'static) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            reader: Box::new(reader),
        })
    }

    pub fn from_bytes(options: EntrySourceOptions, data: Vec<u8>) -> Result<Self> {
        Self::new(options, std::io::Cursor::new(data))
    }
}

impl EntrySource for DataReaderEntrySource {
    fn options(&self) -> &EntrySourceOptions {
        &self.options
    }

    fn next_chunk(&mut self, max_len: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; max_len.max(1)];
        let n = self.reader.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

/// The merger's workhorse: wraps an existing entry and copies its already-compressed bytes
/// verbatim (§4.7).
pub struct ArchiveEntryEntrySource {
    options: EntrySourceOptions,
    stream: RawEntryStream,
    metadata: RawEntryMetadata,
}

impl ArchiveEntryEntrySource {
    pub fn new(output_name: String, entry: &EntryReader) -> Result<Self> {
        let record = entry.record();
        let extra_fields = record.extra_fields()?;
        // Extended-timestamp atime/ctime are local-header-only per spec; strip them when
        // re-emitting so the copied central record doesn't claim fields it never writes.
        let extra_fields = extra_fields
            .into_iter()
            .map(|f| match f {
                ExtraField::Timestamp { mtime, .. } => ExtraField::Timestamp {
                    mtime,
                    atime: None,
                    ctime: None,
                },
                other => other,
            })
            .collect();

        let metadata = RawEntryMetadata {
            method: record.compression_method,
            crc32: record.crc32,
            compressed_size: record.compressed_size,
            uncompressed_size: record.uncompressed_size,
            extra_fields,
        };

        let mut options = EntrySourceOptions::new(output_name);
        // Any configured `compressionMethod` is ignored for a raw copy (documented behavior,
        // §4.7); `options.compression_method` is left at its default and never consulted.
        options.force_zip64 = record.compressed_size > u32::MAX as u64
            || record.uncompressed_size > u32::MAX as u64
            || record.local_header_offset > u32::MAX as u64;
        // The source entry's own UTF-8-vs-CP437 choice must carry over verbatim: a raw copy's
        // name/comment bytes are never re-encoded, so forcing CP437 encoding here on a name that
        // isn't CP437-representable (e.g. Japanese or emoji) would fail even though the bytes
        // being written are already valid.
        options.force_utf8_file_name = record.is_utf8();
        options.internal_file_attributes = record.internal_attributes;
        options.external_file_attributes = record.external_attributes;
        options.min_made_by_version = record.made_by_version;
        options.min_extraction_version = record.extraction_version;

        Ok(Self {
            options,
            stream: entry.open_raw_stream()?,
            metadata,
        })
    }
}

impl EntrySource for ArchiveEntryEntrySource {
    fn options(&self) -> &EntrySourceOptions {
        &self.options
    }

    fn next_chunk(&mut self, max_len: usize) -> Result<Option<Vec<u8>>> {
        self.stream.next_chunk(max_len as u64)
    }

    fn is_raw_copy(&self) -> bool {
        true
    }

    fn raw_metadata(&self) -> Option<&RawEntryMetadata> {
        Some(&self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_name() {
        let opts = EntrySourceOptions::new("");
        assert!(matches!(opts.validate(), Err(FluxZipError::InvalidOption(_))));
    }

    #[test]
    fn data_reader_yields_chunks_then_none() {
        let opts = EntrySourceOptions::new("a.txt");
        let mut src = DataReaderEntrySource::from_bytes(opts, b"hello world".to_vec()).unwrap();
        let mut collected = Vec::new();
        loop {
            match src.next_chunk(4).unwrap() {
                Some(chunk) => collected.extend(chunk),
                None => break,
            }
        }
        assert_eq!(collected, b"hello world");
        assert!(src.next_chunk(4).unwrap().is_none());
    }
}
