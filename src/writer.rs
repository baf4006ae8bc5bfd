//! Pull-based archive emitter: composes local headers, entry payloads, data descriptors, and
//! the central directory as a lazy sequence of byte chunks (§4.6).

use crc32fast::Hasher as Crc32;

use crate::codec::ByteWriter;
use crate::compression::{CompressionRegistry, DataProcessor};
use crate::constants::*;
use crate::entry_source::{EntrySource, EntrySourceOptions, RawEntryMetadata};
use crate::error::{FluxZipError, Result};
use crate::extra::{self, ExtraField};
use crate::text::{self, Emission};

/// Archive-level write options (§6).
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteArchiveOptions {
    /// Force a ZIP64 end-of-central-directory record and locator even when the classic fields
    /// would fit, and force ZIP64 extensions on every entry.
    pub force_zip64: bool,
}

/// One completed entry's header fields, snapshotted once its payload is fully written, ready to
/// be re-serialized into the central directory.
struct CentralRecord {
    name_bytes: Vec<u8>,
    comment_bytes: Vec<u8>,
    utf8_flag: bool,
    method: u16,
    mod_date: u16,
    mod_time: u16,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    made_by_version: u16,
    extraction_version: u16,
    internal_attrs: u16,
    external_attrs: u32,
    extra_fields: Vec<ExtraField>,
    zip64: Zip64Escalation,
}

#[derive(Debug, Clone, Copy, Default)]
struct Zip64Escalation {
    uncompressed_size: bool,
    compressed_size: bool,
    local_header_offset: bool,
}

impl Zip64Escalation {
    fn any(&self) -> bool {
        self.uncompressed_size || self.compressed_size || self.local_header_offset
    }
}

fn escalation_for(forced: bool, uncompressed_size: u64, compressed_size: u64, local_header_offset: u64) -> Zip64Escalation {
    let over = |v: u64| v > (ZIP64_SENTINEL_32 - 1) as u64;
    Zip64Escalation {
        uncompressed_size: forced || over(uncompressed_size),
        compressed_size: forced || over(compressed_size),
        local_header_offset: forced || over(local_header_offset),
    }
}

struct CurrentEntry {
    source: Box<dyn EntrySource>,
    options: EntrySourceOptions,
    processor: Option<Box<dyn DataProcessor>>,
    crc_hasher: Option<Crc32>,
    local_header_offset: u64,
    compressed_count: u64,
    uncompressed_count: u64,
    method: u16,
    input_exhausted: bool,
    name_bytes: Vec<u8>,
    comment_bytes: Vec<u8>,
    utf8_flag: bool,
    mod_date: u16,
    mod_time: u16,
    made_by_version: u16,
    extraction_version: u16,
    raw_metadata: Option<RawEntryMetadata>,
}

enum Phase {
    Entries,
    CentralDirectory,
    Eocd,
    Done,
}

const PULL_SIZE: usize = 32 * 1024;

/// Pull-based emitter: call [`next_chunk`](ArchiveWriter::next_chunk) until it returns `Ok(None)`.
pub struct ArchiveWriter {
    factory: Box<dyn FnMut() -> Result<Option<Box<dyn EntrySource>>>>,
    registry: CompressionRegistry,
    force_zip64: bool,
    phase: Phase,
    current: Option<CurrentEntry>,
    offset: u64,
    central_records: Vec<CentralRecord>,
    cd_index: usize,
    cd_start_offset: u64,
    output_buf: Vec<u8>,
    chunk_threshold: usize,
}

impl ArchiveWriter {
    pub fn new(
        factory: impl FnMut() -> Result<Option<Box<dyn EntrySource>>> + 'static,
        registry: CompressionRegistry,
        options: WriteArchiveOptions,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            registry,
            force_zip64: options.force_zip64,
            phase: Phase::Entries,
            current: None,
            offset: 0,
            central_records: Vec::new(),
            cd_index: 0,
            cd_start_offset: 0,
            output_buf: Vec::new(),
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        }
    }

    fn drain_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output_buf)
    }

    /// Pulls the next chunk of archive bytes, or `Ok(None)` once the end-of-stream sentinel has
    /// been fully delivered.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if self.output_buf.len() >= self.chunk_threshold {
                return Ok(Some(self.drain_output()));
            }
            match self.phase {
                Phase::Entries => self.advance_entries()?,
                Phase::CentralDirectory => self.advance_central_directory()?,
                Phase::Eocd => {
                    self.emit_eocd();
                    self.phase = Phase::Done;
                }
                Phase::Done => {
                    return if self.output_buf.is_empty() {
                        Ok(None)
                    } else {
                        Ok(Some(self.drain_output()))
                    };
                }
            }
        }
    }

    fn advance_entries(&mut self) -> Result<()> {
        if self.current.is_none() {
            match (self.factory)()? {
                Some(source) => self.start_entry(source)?,
                None => {
                    self.cd_start_offset = self.offset;
                    self.cd_index = 0;
                    self.phase = Phase::CentralDirectory;
                }
            }
            return Ok(());
        }

        let mut entry = self.current.take().unwrap();
        if entry.input_exhausted {
            self.finish_entry(entry)?;
            return Ok(());
        }

        match entry.source.next_chunk(PULL_SIZE)? {
            Some(chunk) => {
                if entry.source.is_raw_copy() {
                    self.offset += chunk.len() as u64;
                    entry.compressed_count += chunk.len() as u64;
                    self.output_buf.extend_from_slice(&chunk);
                } else {
                    if let Some(h) = entry.crc_hasher.as_mut() {
                        h.update(&chunk);
                    }
                    entry.uncompressed_count += chunk.len() as u64;
                    entry
                        .processor
                        .as_mut()
                        .expect("non-raw entry has a processor")
                        .push(&chunk)?;
                    self.pull_processor_output(&mut entry)?;
                }
            }
            None => {
                entry.input_exhausted = true;
                if !entry.source.is_raw_copy() {
                    entry
                        .processor
                        .as_mut()
                        .expect("non-raw entry has a processor")
                        .finish()?;
                    self.drain_processor_to_done(&mut entry)?;
                }
            }
        }

        self.current = Some(entry);
        Ok(())
    }

    fn pull_processor_output(&mut self, entry: &mut CurrentEntry) -> Result<()> {
        let (data, _done) = entry
            .processor
            .as_mut()
            .expect("non-raw entry has a processor")
            .pull()?;
        self.offset += data.len() as u64;
        entry.compressed_count += data.len() as u64;
        self.output_buf.extend_from_slice(&data);
        Ok(())
    }

    fn drain_processor_to_done(&mut self, entry: &mut CurrentEntry) -> Result<()> {
        loop {
            let (data, done) = entry
                .processor
                .as_mut()
                .expect("non-raw entry has a processor")
                .pull()?;
            self.offset += data.len() as u64;
            entry.compressed_count += data.len() as u64;
            self.output_buf.extend_from_slice(&data);
            if done {
                break;
            }
        }
        Ok(())
    }

    fn start_entry(&mut self, source: Box<dyn EntrySource>) -> Result<()> {
        let options = source.options().clone();
        let local_header_offset = self.offset;

        let (name_bytes, comment_bytes, utf8_flag, local_extra) = encode_header_text(&options)?;

        let method = if source.is_raw_copy() {
            source
                .raw_metadata()
                .expect("raw copy source reports raw metadata")
                .method
        } else {
            options.compression_method
        };

        let mut flags = FLAG_DATA_DESCRIPTOR;
        if utf8_flag {
            flags |= FLAG_UTF8;
        }

        let (mod_date, mod_time) = options.mod_time.map(|t| t.dos_date_time()).unwrap_or((0, 0));

        let predicted_zip64 =
            options.force_zip64 || self.force_zip64 || local_header_offset > (ZIP64_SENTINEL_32 - 1) as u64;
        let extraction_version = options
            .min_extraction_version
            .max(if predicted_zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT });
        let made_by_version = options.min_made_by_version.max(MADE_BY_UNIX);

        let mut header = ByteWriter::new();
        header.u32(LOCAL_FILE_HEADER_SIGNATURE);
        header.u16(extraction_version);
        header.u16(flags);
        header.u16(method);
        header.u16(mod_time);
        header.u16(mod_date);
        header.u32(0); // CRC placeholder; real value lives in the data descriptor
        header.u32(0); // compressed size placeholder
        header.u32(0); // uncompressed size placeholder
        header.u16(name_bytes.len() as u16);
        header.u16(local_extra.len() as u16);
        header.bytes(&name_bytes);
        header.bytes(&local_extra);
        let header_bytes = header.into_vec();
        self.offset += header_bytes.len() as u64;
        self.output_buf.extend_from_slice(&header_bytes);

        let raw_metadata = source.raw_metadata().cloned();
        let processor = if source.is_raw_copy() {
            None
        } else {
            Some(self.registry.encoder_for(method, options.compression_level)?)
        };
        let crc_hasher = if source.is_raw_copy() { None } else { Some(Crc32::new()) };

        self.current = Some(CurrentEntry {
            source,
            options,
            processor,
            crc_hasher,
            local_header_offset,
            compressed_count: 0,
            uncompressed_count: 0,
            method,
            input_exhausted: false,
            name_bytes,
            comment_bytes,
            utf8_flag,
            mod_date,
            mod_time,
            made_by_version,
            extraction_version,
            raw_metadata,
        });
        Ok(())
    }

    fn finish_entry(&mut self, entry: CurrentEntry) -> Result<()> {
        let CurrentEntry {
            options,
            crc_hasher,
            local_header_offset,
            compressed_count,
            uncompressed_count,
            name_bytes,
            comment_bytes,
            utf8_flag,
            mod_date,
            mod_time,
            made_by_version,
            extraction_version,
            raw_metadata,
            method,
            ..
        } = entry;

        let (crc32, uncompressed_size) = match &raw_metadata {
            Some(meta) => {
                if compressed_count != meta.compressed_size {
                    return Err(FluxZipError::Malformed(format!(
                        "raw-copy entry '{}' copied {} bytes but its declared compressed size was {}",
                        options.file_name, compressed_count, meta.compressed_size
                    )));
                }
                (meta.crc32, meta.uncompressed_size)
            }
            None => (
                crc_hasher.expect("non-raw entry has a CRC hasher").finalize(),
                uncompressed_count,
            ),
        };
        let compressed_size = compressed_count;

        let zip64 = escalation_for(
            options.force_zip64 || self.force_zip64,
            uncompressed_size,
            compressed_size,
            local_header_offset,
        );

        // Data descriptor, with its optional signature always emitted (DESIGN.md resolves this
        // open question: many readers in the wild require the marker to be present).
        let mut dd = ByteWriter::new();
        dd.u32(DATA_DESCRIPTOR_SIGNATURE);
        dd.u32(crc32);
        if zip64.any() {
            dd.u64(compressed_size);
            dd.u64(uncompressed_size);
        } else {
            dd.u32(compressed_size as u32);
            dd.u32(uncompressed_size as u32);
        }
        let dd_bytes = dd.into_vec();
        self.offset += dd_bytes.len() as u64;
        self.output_buf.extend_from_slice(&dd_bytes);

        let mut extra_fields = if let Some(meta) = &raw_metadata {
            meta.extra_fields.clone()
        } else {
            build_fresh_extra_fields(&options, utf8_flag, &name_bytes, &comment_bytes)
        };
        extra_fields.retain(|f| !matches!(f, ExtraField::Zip64 { .. }));
        if zip64.any() {
            extra_fields.insert(
                0,
                ExtraField::Zip64 {
                    uncompressed_size: zip64.uncompressed_size.then_some(uncompressed_size),
                    compressed_size: zip64.compressed_size.then_some(compressed_size),
                    local_header_offset: zip64.local_header_offset.then_some(local_header_offset),
                    disk_start: None,
                },
            );
        }

        let extraction_version = extraction_version.max(if zip64.any() { VERSION_ZIP64 } else { VERSION_DEFAULT });

        self.central_records.push(CentralRecord {
            name_bytes,
            comment_bytes,
            utf8_flag,
            method,
            mod_date,
            mod_time,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            made_by_version,
            extraction_version,
            internal_attrs: options.internal_file_attributes,
            external_attrs: options.external_file_attributes,
            extra_fields,
            zip64,
        });
        self.current = None;
        Ok(())
    }

    fn advance_central_directory(&mut self) -> Result<()> {
        if self.cd_index >= self.central_records.len() {
            self.phase = Phase::Eocd;
            return Ok(());
        }
        let record = &self.central_records[self.cd_index];
        let extra_bytes = extra::emit(&record.extra_fields);

        let mut flags = FLAG_DATA_DESCRIPTOR;
        if record.utf8_flag {
            flags |= FLAG_UTF8;
        }

        let mut header = ByteWriter::new();
        header.u32(CENTRAL_DIRECTORY_SIGNATURE);
        header.u16(record.made_by_version);
        header.u16(record.extraction_version);
        header.u16(flags);
        header.u16(record.method);
        header.u16(record.mod_time);
        header.u16(record.mod_date);
        header.u32(record.crc32);
        header.u32(if record.zip64.compressed_size {
            ZIP64_SENTINEL_32
        } else {
            record.compressed_size as u32
        });
        header.u32(if record.zip64.uncompressed_size {
            ZIP64_SENTINEL_32
        } else {
            record.uncompressed_size as u32
        });
        header.u16(record.name_bytes.len() as u16);
        header.u16(extra_bytes.len() as u16);
        header.u16(record.comment_bytes.len() as u16);
        header.u16(0); // disk number start
        header.u16(record.internal_attrs);
        header.u32(record.external_attrs);
        header.u32(if record.zip64.local_header_offset {
            ZIP64_SENTINEL_32
        } else {
            record.local_header_offset as u32
        });
        header.bytes(&record.name_bytes);
        header.bytes(&extra_bytes);
        header.bytes(&record.comment_bytes);

        let bytes = header.into_vec();
        self.offset += bytes.len() as u64;
        self.output_buf.extend_from_slice(&bytes);
        self.cd_index += 1;
        Ok(())
    }

    fn emit_eocd(&mut self) {
        let cd_size = self.offset - self.cd_start_offset;
        let cd_offset = self.cd_start_offset;
        let total_entries = self.central_records.len() as u64;

        let needs_zip64 = self.force_zip64
            || total_entries >= ZIP64_SENTINEL_16 as u64
            || cd_size > (ZIP64_SENTINEL_32 - 1) as u64
            || cd_offset > (ZIP64_SENTINEL_32 - 1) as u64;

        if needs_zip64 {
            let mut z = ByteWriter::new();
            z.u32(ZIP64_EOCD_SIGNATURE);
            z.u64(ZIP64_EOCD_FIXED_SIZE);
            z.u16(VERSION_ZIP64);
            z.u16(VERSION_ZIP64);
            z.u32(0); // disk number
            z.u32(0); // disk with central directory start
            z.u64(total_entries);
            z.u64(total_entries);
            z.u64(cd_size);
            z.u64(cd_offset);
            let z_bytes = z.into_vec();
            let zip64_eocd_offset = self.offset;
            self.offset += z_bytes.len() as u64;
            self.output_buf.extend_from_slice(&z_bytes);

            let mut locator = ByteWriter::new();
            locator.u32(ZIP64_EOCD_LOCATOR_SIGNATURE);
            locator.u32(0); // disk with the ZIP64 EOCD
            locator.u64(zip64_eocd_offset);
            locator.u32(1); // total number of disks
            let locator_bytes = locator.into_vec();
            self.offset += locator_bytes.len() as u64;
            self.output_buf.extend_from_slice(&locator_bytes);
        }

        let mut eocd = ByteWriter::new();
        eocd.u32(EOCD_SIGNATURE);
        eocd.u16(0); // disk number
        eocd.u16(0); // disk with central directory start
        if total_entries >= ZIP64_SENTINEL_16 as u64 {
            eocd.u16(ZIP64_SENTINEL_16);
            eocd.u16(ZIP64_SENTINEL_16);
        } else {
            eocd.u16(total_entries as u16);
            eocd.u16(total_entries as u16);
        }
        eocd.u32(if cd_size > (ZIP64_SENTINEL_32 - 1) as u64 {
            ZIP64_SENTINEL_32
        } else {
            cd_size as u32
        });
        eocd.u32(if cd_offset > (ZIP64_SENTINEL_32 - 1) as u64 {
            ZIP64_SENTINEL_32
        } else {
            cd_offset as u32
        });
        eocd.u16(0); // archive comment length
        let bytes = eocd.into_vec();
        self.offset += bytes.len() as u64;
        self.output_buf.extend_from_slice(&bytes);
    }
}

/// Encodes the file name and comment for the local header, returning `(name_bytes,
/// comment_bytes, utf8_flag, local_header_extra_field_bytes)`. Extended-timestamp atime/ctime
/// are local-header only; the central directory only ever repeats mtime.
fn encode_header_text(options: &EntrySourceOptions) -> Result<(Vec<u8>, Vec<u8>, bool, Vec<u8>)> {
    let name_emission = text::encode_name_or_comment(
        &options.file_name,
        options.force_utf8_file_name,
        options.unicode_file_name_field,
    )?;
    let comment_emission = text::encode_name_or_comment(
        &options.file_comment,
        options.force_utf8_file_name,
        options.unicode_comment_field,
    )?;

    let mut fields = Vec::new();
    let (name_bytes, name_utf8) = unpack_emission(name_emission, true, &mut fields);
    let (comment_bytes, comment_utf8) = unpack_emission(comment_emission, false, &mut fields);
    // General-purpose bit 11 governs name and comment together (APPNOTE 4.4.4); forcing UTF-8
    // on either implies both must be encoded that way.
    let utf8_flag = name_utf8 || comment_utf8;

    if options.extended_timestamp_field
        && (options.mod_time.is_some() || options.ac_time.is_some() || options.cr_time.is_some())
    {
        fields.push(ExtraField::Timestamp {
            mtime: options.mod_time.map(|t| t.unix_time),
            atime: options.ac_time,
            ctime: options.cr_time,
        });
    }

    let local_extra = extra::emit(&fields);
    Ok((name_bytes, comment_bytes, utf8_flag, local_extra))
}

fn unpack_emission(emission: Emission, is_path: bool, fields: &mut Vec<ExtraField>) -> (Vec<u8>, bool) {
    match emission {
        Emission::Utf8(bytes) => (bytes, true),
        Emission::Cp437 {
            classic_bytes,
            unicode_field,
        } => {
            if let Some(utf8_bytes) = unicode_field {
                let field = if is_path {
                    ExtraField::UnicodePath {
                        name_crc32: crc32fast::hash(&classic_bytes),
                        utf8_name: utf8_bytes,
                    }
                } else {
                    ExtraField::UnicodeComment {
                        comment_crc32: crc32fast::hash(&classic_bytes),
                        utf8_comment: utf8_bytes,
                    }
                };
                fields.push(field);
            }
            (classic_bytes, false)
        }
    }
}

/// Rebuilds the central directory's extra fields for a freshly-compressed (non-raw-copy) entry:
/// mtime only (no atime/ctime), plus Unicode fields if not already expressed via the UTF-8 flag.
fn build_fresh_extra_fields(
    options: &EntrySourceOptions,
    utf8_flag: bool,
    name_bytes: &[u8],
    comment_bytes: &[u8],
) -> Vec<ExtraField> {
    let mut fields = Vec::new();
    if options.extended_timestamp_field && options.mod_time.is_some() {
        fields.push(ExtraField::Timestamp {
            mtime: options.mod_time.map(|t| t.unix_time),
            atime: None,
            ctime: None,
        });
    }
    if !utf8_flag && options.unicode_file_name_field && !options.file_name.is_ascii() {
        fields.push(ExtraField::UnicodePath {
            name_crc32: crc32fast::hash(name_bytes),
            utf8_name: options.file_name.as_bytes().to_vec(),
        });
    }
    if !utf8_flag && options.unicode_comment_field && !options.file_comment.is_ascii() {
        fields.push(ExtraField::UnicodeComment {
            comment_crc32: crc32fast::hash(comment_bytes),
            utf8_comment: options.file_comment.as_bytes().to_vec(),
        });
    }
    fields
}
