//! Per-entry read facade: metadata accessors, a cap-checked full read, and a chunked
//! decompressing stream (§4.3).

use std::rc::Rc;

use crc32fast::Hasher as Crc32;

use crate::byte_source::ByteSource;
use crate::central_directory::EntryRecord;
use crate::codec::ByteReader;
use crate::compression::{CompressionRegistry, DataProcessor};
use crate::constants::*;
use crate::error::{FluxZipError, Result};

/// Re-parses the local file header to find where the (possibly compressed) payload begins.
///
/// The central directory record is authoritative for sizes and method; the local header is
/// only consulted for its name/extra-field *lengths*, which determine how many bytes to skip
/// before the payload — those lengths can legitimately differ from the central directory's
/// (§3, "EntryRecord" relationships).
fn locate_payload(source: &dyn ByteSource, record: &EntryRecord) -> Result<u64> {
    let header = source.read(record.local_header_offset, LOCAL_FILE_HEADER_FIXED_SIZE)?;
    let mut r = ByteReader::new(&header);
    let sig = r.u32()?;
    if sig != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(FluxZipError::Malformed(format!(
            "local header signature mismatch at offset {}",
            record.local_header_offset
        )));
    }
    r.skip(2 + 2 + 2 + 2 + 2 + 4 + 4 + 4)?; // version, flags, method, time, date, crc, sizes
    let name_len = r.u16()? as u64;
    let extra_len = r.u16()? as u64;
    Ok(record.local_header_offset + LOCAL_FILE_HEADER_FIXED_SIZE + name_len + extra_len)
}

/// A chunked decompressing reader over one entry's payload.
///
/// `read(max_input_bytes)`'s contract (§4.3, §8 property 6) is load-bearing: it reads up to
/// `max_input_bytes` of *compressed* input, feeds it through the method's [`DataProcessor`],
/// and returns whatever decompressed bytes emerge. `Ok(Some(data))` with `data` possibly empty
/// means "keep calling, more may come"; `Ok(None)` means end-of-stream, and is returned exactly
/// once before every later call also returns `Ok(None)`.
pub struct EntryDataReader {
    source: Rc<dyn ByteSource>,
    processor: Box<dyn DataProcessor>,
    cursor: u64,
    compressed_remaining: u64,
    hasher: Option<Crc32>,
    expected_crc: u32,
    state: ReaderState,
}

#[derive(PartialEq, Eq)]
enum ReaderState {
    Active,
    AwaitingFinalCheck,
    Finished,
}

impl EntryDataReader {
    fn new(
        source: Rc<dyn ByteSource>,
        payload_offset: u64,
        compressed_size: u64,
        expected_crc: u32,
        processor: Box<dyn DataProcessor>,
    ) -> Self {
        Self {
            source,
            processor,
            cursor: payload_offset,
            compressed_remaining: compressed_size,
            hasher: Some(Crc32::new()),
            expected_crc,
            state: ReaderState::Active,
        }
    }

    /// Reads at most `max_input_bytes` of compressed input and returns the decompressed bytes
    /// it yields. See the type's doc comment for the empty-vs-EOF contract.
    pub fn read(&mut self, max_input_bytes: u64) -> Result<Option<Vec<u8>>> {
        match self.state {
            ReaderState::Finished => Ok(None),
            ReaderState::AwaitingFinalCheck => {
                self.state = ReaderState::Finished;
                self.check_crc()?;
                Ok(None)
            }
            ReaderState::Active => {
                if self.compressed_remaining == 0 {
                    self.processor.finish()?;
                } else {
                    let to_read = max_input_bytes.min(self.compressed_remaining);
                    if to_read > 0 {
                        let chunk = self.source.read(self.cursor, to_read)?;
                        self.processor.push(&chunk)?;
                        self.cursor += to_read;
                        self.compressed_remaining -= to_read;
                        if self.compressed_remaining == 0 {
                            self.processor.finish()?;
                        }
                    }
                }
                let (data, done) = self.processor.pull()?;
                if let Some(h) = self.hasher.as_mut() {
                    h.update(&data);
                }
                if done {
                    if data.is_empty() {
                        self.state = ReaderState::Finished;
                        self.check_crc()?;
                        Ok(None)
                    } else {
                        self.state = ReaderState::AwaitingFinalCheck;
                        Ok(Some(data))
                    }
                } else {
                    Ok(Some(data))
                }
            }
        }
    }

    fn check_crc(&mut self) -> Result<()> {
        if let Some(h) = self.hasher.take() {
            let actual = h.finalize();
            if actual != self.expected_crc {
                return Err(FluxZipError::CrcMismatch {
                    expected: self.expected_crc,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Drains the stream to completion and returns all decompressed bytes, verifying CRC.
    pub fn read_to_end(&mut self, chunk_size: u64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match self.read(chunk_size)? {
                Some(data) => out.extend(data),
                None => break,
            }
        }
        Ok(out)
    }
}

/// Facade over one [`EntryRecord`], as handed out by `Archive::entries()`/`Archive::find()`.
pub struct EntryReader {
    source: Rc<dyn ByteSource>,
    record: EntryRecord,
}

const READ_CHUNK: u64 = 64 * 1024;

impl EntryReader {
    pub fn new(source: Rc<dyn ByteSource>, record: EntryRecord) -> Self {
        Self { source, record }
    }

    pub fn record(&self) -> &EntryRecord {
        &self.record
    }

    pub fn name(&self) -> String {
        self.record.decoded_name()
    }

    pub fn comment(&self) -> String {
        self.record.decoded_comment()
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.record.uncompressed_size
    }

    pub fn compressed_size(&self) -> u64 {
        self.record.compressed_size
    }

    pub fn compression_method(&self) -> u16 {
        self.record.compression_method
    }

    pub fn modified_time(&self) -> (u16, u8, u8, u8, u8, u8) {
        self.record.modified_time()
    }

    /// Opens a chunked decompressing stream over this entry's payload.
    pub fn open_stream(&self, registry: &CompressionRegistry) -> Result<EntryDataReader> {
        if self.record.is_encrypted() {
            return Err(FluxZipError::UnsupportedFeature(
                "encrypted entries are not supported".into(),
            ));
        }
        let payload_offset = locate_payload(self.source.as_ref(), &self.record)?;
        let processor = registry.decoder_for(self.record.compression_method)?;
        Ok(EntryDataReader::new(
            self.source.clone(),
            payload_offset,
            self.record.compressed_size,
            self.record.crc32,
            processor,
        ))
    }

    /// Reads this entry's full uncompressed contents, rejecting entries whose declared
    /// uncompressed size exceeds `cap` before doing any decompression work (§4.3).
    pub fn read_all(&self, registry: &CompressionRegistry, cap: u64) -> Result<Vec<u8>> {
        if self.record.uncompressed_size > cap {
            return Err(FluxZipError::TooLarge {
                size: self.record.uncompressed_size,
                cap,
            });
        }
        let mut stream = self.open_stream(registry)?;
        stream.read_to_end(READ_CHUNK)
    }

    /// Opens a stream over this entry's *compressed* payload, bypassing decompression and CRC
    /// recomputation entirely. This is the merger's workhorse (§4.7, `ArchiveEntryEntrySource`):
    /// already-compressed bytes are copied through verbatim.
    pub fn open_raw_stream(&self) -> Result<RawEntryStream> {
        if self.record.is_encrypted() {
            return Err(FluxZipError::UnsupportedFeature(
                "encrypted entries are not supported".into(),
            ));
        }
        let payload_offset = locate_payload(self.source.as_ref(), &self.record)?;
        Ok(RawEntryStream {
            source: self.source.clone(),
            cursor: payload_offset,
            remaining: self.record.compressed_size,
        })
    }
}

/// Yields an entry's compressed payload bytes unchanged, in chunks.
pub struct RawEntryStream {
    source: Rc<dyn ByteSource>,
    cursor: u64,
    remaining: u64,
}

impl RawEntryStream {
    pub fn next_chunk(&mut self, max_len: u64) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let to_read = max_len.min(self.remaining);
        let chunk = self.source.read(self.cursor, to_read)?;
        self.cursor += to_read;
        self.remaining -= to_read;
        Ok(Some(chunk))
    }
}
