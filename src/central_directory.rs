//! Locating the end of central directory record(s) and lazily iterating central directory file
//! headers (§4.2).

use std::rc::Rc;

use log::{debug, trace, warn};

use crate::byte_source::ByteSource;
use crate::codec::{unpack_dos_datetime, ByteReader};
use crate::constants::*;
use crate::error::{FluxZipError, Result};
use crate::extra::{self, ExtraField, Zip64Sentinels};
use crate::text;

/// Where the central directory lives and how large it is, resolved once at archive
/// construction (§3, "CentralDirectoryLocation").
#[derive(Debug, Clone)]
pub struct CentralDirectoryLocation {
    pub cd_offset: u64,
    pub cd_size: u64,
    pub total_entries: u64,
    pub comment: Vec<u8>,
    pub is_zip64: bool,
}

/// A decoded central directory file header (§3, "EntryRecord").
#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub made_by_version: u16,
    pub extraction_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub disk_number: u16,
    pub name_raw: Vec<u8>,
    pub comment_raw: Vec<u8>,
    pub extra_raw: Vec<u8>,
    /// Which classic 32-bit fields were sentinel values on disk, i.e. which fields the ZIP64
    /// extra (if any) actually carries. Kept alongside the already-resolved 64-bit sizes/offset
    /// above because a forced-ZIP64 entry can have a small resolved size yet still have stored
    /// its classic field as `0xFFFFFFFF` — the resolved value alone can't tell them apart.
    pub zip64_sentinels: Zip64Sentinels,
    /// Byte offset of this record's signature within the archive (not the central directory);
    /// used as the index key so `find(name)` doesn't need to rescan.
    pub position: u64,
}

impl EntryRecord {
    pub fn is_utf8(&self) -> bool {
        self.flags & FLAG_UTF8 != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn extra_fields(&self) -> Result<Vec<ExtraField>> {
        extra::parse(&self.extra_raw, self.zip64_sentinels)
    }

    pub fn decoded_name(&self) -> String {
        let fields = self.extra_fields().unwrap_or_default();
        let over = text::unicode_override(&fields, &self.name_raw, true);
        text::decode_name_or_comment(&self.name_raw, self.is_utf8(), over)
    }

    pub fn decoded_comment(&self) -> String {
        let fields = self.extra_fields().unwrap_or_default();
        let over = text::unicode_override(&fields, &self.comment_raw, false);
        text::decode_name_or_comment(&self.comment_raw, self.is_utf8(), over)
    }

    /// Modification time as `(year, month, day, hour, minute, second)`.
    pub fn modified_time(&self) -> (u16, u8, u8, u8, u8, u8) {
        unpack_dos_datetime(self.mod_date, self.mod_time)
    }
}

/// Scans backward from the end of `source` for the EOCD signature, then resolves ZIP64
/// escalation if present (§4.2, "Locating EOCD").
pub fn locate(source: &dyn ByteSource) -> Result<CentralDirectoryLocation> {
    let total_len = source.length();
    let window = (EOCD_FIXED_SIZE + MAX_EOCD_COMMENT_LEN).min(total_len);
    let scan_start = total_len - window;
    let tail = source.read(scan_start, window)?;

    let eocd_pos_in_tail = find_signature_backward(&tail, EOCD_SIGNATURE)
        .ok_or(FluxZipError::NotAZip)?;
    let eocd_offset = scan_start + eocd_pos_in_tail as u64;
    debug!("found EOCD at offset {}", eocd_offset);

    let eocd_bytes = source.read(eocd_offset, EOCD_FIXED_SIZE)?;
    let mut r = ByteReader::new(&eocd_bytes);
    let sig = r.u32()?;
    if sig != EOCD_SIGNATURE {
        return Err(FluxZipError::Malformed("EOCD signature mismatch".into()));
    }
    let disk_number = r.u16()?;
    let cd_start_disk = r.u16()?;
    let entries_this_disk = r.u16()?;
    let total_entries_16 = r.u16()?;
    let cd_size_32 = r.u32()?;
    let cd_offset_32 = r.u32()?;
    let comment_len = r.u16()? as u64;

    if disk_number != 0 || cd_start_disk != 0 {
        return Err(FluxZipError::UnsupportedFeature(
            "multi-disk archives are not supported".into(),
        ));
    }

    let comment = if comment_len > 0 {
        source.read(eocd_offset + EOCD_FIXED_SIZE, comment_len)?
    } else {
        Vec::new()
    };

    let needs_zip64 = total_entries_16 == ZIP64_SENTINEL_16
        || cd_size_32 == ZIP64_SENTINEL_32
        || cd_offset_32 == ZIP64_SENTINEL_32
        || entries_this_disk == ZIP64_SENTINEL_16;

    // A ZIP64 locator may also be present even when the classic fields didn't need escalation
    // (some writers always emit it); prefer it whenever found 20 bytes before the EOCD.
    let locator_offset = eocd_offset.checked_sub(ZIP64_EOCD_LOCATOR_SIZE);
    let locator = match locator_offset {
        Some(off) if off < total_len => {
            let bytes = source.read(off, ZIP64_EOCD_LOCATOR_SIZE)?;
            let mut lr = ByteReader::new(&bytes);
            if lr.u32()? == ZIP64_EOCD_LOCATOR_SIGNATURE {
                let _disk_with_zip64_eocd = lr.u32()?;
                let zip64_eocd_offset = lr.u64()?;
                Some(zip64_eocd_offset)
            } else {
                None
            }
        }
        _ => None,
    };

    if let Some(zip64_eocd_offset) = locator {
        debug!("found ZIP64 EOCD locator pointing to offset {}", zip64_eocd_offset);
        let loc = parse_zip64_eocd(source, zip64_eocd_offset)?;
        return Ok(CentralDirectoryLocation {
            cd_offset: loc.0,
            cd_size: loc.1,
            total_entries: loc.2,
            comment,
            is_zip64: true,
        });
    }

    if needs_zip64 {
        return Err(FluxZipError::Malformed(
            "EOCD requires ZIP64 escalation but no ZIP64 locator was found".into(),
        ));
    }

    Ok(CentralDirectoryLocation {
        cd_offset: cd_offset_32 as u64,
        cd_size: cd_size_32 as u64,
        total_entries: total_entries_16 as u64,
        comment,
        is_zip64: false,
    })
}

/// Returns `(cd_offset, cd_size, total_entries)`.
fn parse_zip64_eocd(source: &dyn ByteSource, offset: u64) -> Result<(u64, u64, u64)> {
    let header = source.read(offset, 12 + ZIP64_EOCD_FIXED_SIZE)?;
    let mut r = ByteReader::new(&header);
    let sig = r.u32()?;
    if sig != ZIP64_EOCD_SIGNATURE {
        return Err(FluxZipError::Malformed(
            "ZIP64 EOCD signature mismatch".into(),
        ));
    }
    let _record_size = r.u64()?;
    let _version_made_by = r.u16()?;
    let _version_needed = r.u16()?;
    let disk_number = r.u32()?;
    let cd_start_disk = r.u32()?;
    let _entries_this_disk = r.u64()?;
    let total_entries = r.u64()?;
    let cd_size = r.u64()?;
    let cd_offset = r.u64()?;
    if disk_number != 0 || cd_start_disk != 0 {
        return Err(FluxZipError::UnsupportedFeature(
            "multi-disk archives are not supported".into(),
        ));
    }
    Ok((cd_offset, cd_size, total_entries))
}

fn find_signature_backward(buf: &[u8], signature: u32) -> Option<usize> {
    if buf.len() < 4 {
        return None;
    }
    let sig_bytes = signature.to_le_bytes();
    (0..=buf.len() - 4)
        .rev()
        .find(|&i| buf[i..i + 4] == sig_bytes)
}

/// Lazily iterates central directory file headers, refilling a bounded buffer as needed so an
/// archive with tens of thousands of entries never has its whole directory materialized at
/// once (§4.2, "Iteration").
pub struct CentralDirectoryIterator {
    source: Rc<dyn ByteSource>,
    cd_end: u64,
    cursor: u64,
    buf: Vec<u8>,
    buf_start: u64,
    buf_target: usize,
    remaining_entries: u64,
    failed: bool,
}

impl CentralDirectoryIterator {
    pub fn new(source: Rc<dyn ByteSource>, location: &CentralDirectoryLocation, buffer_size: usize) -> Self {
        let buf_target = buffer_size.max(CENTRAL_DIRECTORY_FIXED_SIZE as usize * 2);
        Self {
            source,
            cd_end: location.cd_offset + location.cd_size,
            cursor: location.cd_offset,
            buf: Vec::new(),
            buf_start: location.cd_offset,
            buf_target,
            remaining_entries: location.total_entries,
            failed: false,
        }
    }

    fn ensure(&mut self, needed: usize) -> Result<bool> {
        let available = (self.buf_start + self.buf.len() as u64).saturating_sub(self.cursor) as usize;
        if available >= needed {
            return Ok(true);
        }
        if self.cursor >= self.cd_end {
            return Ok(false);
        }
        // Drop already-consumed bytes, then refill from the cursor forward.
        let consumed = (self.cursor - self.buf_start) as usize;
        if consumed > 0 && consumed <= self.buf.len() {
            self.buf.drain(0..consumed);
            self.buf_start = self.cursor;
        }
        let want = needed.max(self.buf_target);
        let remaining_in_cd = (self.cd_end - self.cursor) as usize;
        let to_read = want.min(remaining_in_cd).saturating_sub(self.buf.len());
        if to_read == 0 {
            return Ok(self.buf.len() >= needed);
        }
        let read_at = self.buf_start + self.buf.len() as u64;
        trace!("refilling central directory buffer: {} bytes at {}", to_read, read_at);
        let chunk = self.source.read(read_at, to_read as u64)?;
        self.buf.extend_from_slice(&chunk);
        Ok((self.buf.len() as u64).saturating_sub(self.cursor - self.buf_start) >= needed as u64)
    }

    fn slice_from_cursor(&self, len: usize) -> &[u8] {
        let start = (self.cursor - self.buf_start) as usize;
        &self.buf[start..start + len]
    }

    fn next_record(&mut self) -> Result<Option<EntryRecord>> {
        if self.failed || self.remaining_entries == 0 || self.cursor >= self.cd_end {
            return Ok(None);
        }

        if !self.ensure(CENTRAL_DIRECTORY_FIXED_SIZE as usize)? {
            return Err(FluxZipError::Malformed(
                "central directory ended before the declared entry count".into(),
            ));
        }

        let position = self.cursor;
        let fixed = self.slice_from_cursor(CENTRAL_DIRECTORY_FIXED_SIZE as usize).to_vec();
        let mut r = ByteReader::new(&fixed);
        let sig = r.u32()?;
        if sig != CENTRAL_DIRECTORY_SIGNATURE {
            self.failed = true;
            return Err(FluxZipError::Malformed(format!(
                "bad central directory signature 0x{:08x} at offset {}",
                sig, position
            )));
        }
        let made_by_version = r.u16()?;
        let extraction_version = r.u16()?;
        let flags = r.u16()?;
        let compression_method = r.u16()?;
        let mod_time = r.u16()?;
        let mod_date = r.u16()?;
        let crc32 = r.u32()?;
        let compressed_size_32 = r.u32()?;
        let uncompressed_size_32 = r.u32()?;
        let name_len = r.u16()? as usize;
        let extra_len = r.u16()? as usize;
        let comment_len = r.u16()? as usize;
        let disk_number = r.u16()?;
        let internal_attributes = r.u16()?;
        let external_attributes = r.u32()?;
        let local_header_offset_32 = r.u32()?;

        let tail_len = name_len
            .checked_add(extra_len)
            .and_then(|v| v.checked_add(comment_len))
            .ok_or_else(|| FluxZipError::Malformed("entry field lengths overflow".into()))?;

        if self.cursor + CENTRAL_DIRECTORY_FIXED_SIZE + tail_len as u64 > self.cd_end {
            self.failed = true;
            return Err(FluxZipError::Malformed(
                "entry's variable fields cross the central directory boundary".into(),
            ));
        }

        self.cursor += CENTRAL_DIRECTORY_FIXED_SIZE;
        if !self.ensure(tail_len)? {
            self.failed = true;
            return Err(FluxZipError::Malformed(
                "central directory truncated mid-entry".into(),
            ));
        }
        let tail = self.slice_from_cursor(tail_len).to_vec();
        self.cursor += tail_len as u64;

        let name_raw = tail[0..name_len].to_vec();
        let extra_raw = tail[name_len..name_len + extra_len].to_vec();
        let comment_raw = tail[name_len + extra_len..name_len + extra_len + comment_len].to_vec();

        let sentinels = Zip64Sentinels {
            uncompressed_size: uncompressed_size_32 == ZIP64_SENTINEL_32,
            compressed_size: compressed_size_32 == ZIP64_SENTINEL_32,
            local_header_offset: local_header_offset_32 == ZIP64_SENTINEL_32,
            disk_start: disk_number == ZIP64_SENTINEL_16,
        };
        let zip64 = if sentinels.uncompressed_size
            || sentinels.compressed_size
            || sentinels.local_header_offset
            || sentinels.disk_start
        {
            extra::parse(&extra_raw, sentinels)?
                .into_iter()
                .find_map(|f| match f {
                    ExtraField::Zip64 {
                        uncompressed_size,
                        compressed_size,
                        local_header_offset,
                        disk_start,
                    } => Some((uncompressed_size, compressed_size, local_header_offset, disk_start)),
                    _ => None,
                })
        } else {
            None
        };

        let uncompressed_size = if sentinels.uncompressed_size {
            zip64
                .and_then(|z| z.0)
                .ok_or_else(|| FluxZipError::Malformed("missing ZIP64 uncompressed size".into()))?
        } else {
            uncompressed_size_32 as u64
        };
        let compressed_size = if sentinels.compressed_size {
            zip64
                .and_then(|z| z.1)
                .ok_or_else(|| FluxZipError::Malformed("missing ZIP64 compressed size".into()))?
        } else {
            compressed_size_32 as u64
        };
        let local_header_offset = if sentinels.local_header_offset {
            zip64
                .and_then(|z| z.2)
                .ok_or_else(|| FluxZipError::Malformed("missing ZIP64 local header offset".into()))?
        } else {
            local_header_offset_32 as u64
        };

        if disk_number != 0 && disk_number != ZIP64_SENTINEL_16 {
            warn!("entry claims disk {}, multi-disk archives are unsupported", disk_number);
            return Err(FluxZipError::UnsupportedFeature(format!(
                "entry is on disk {}, expected 0",
                disk_number
            )));
        }

        self.remaining_entries -= 1;

        Ok(Some(EntryRecord {
            made_by_version,
            extraction_version,
            flags,
            compression_method,
            mod_time,
            mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            internal_attributes,
            external_attributes,
            disk_number,
            name_raw,
            comment_raw,
            extra_raw,
            zip64_sentinels: sentinels,
            position,
        }))
    }
}

impl Iterator for CentralDirectoryIterator {
    type Item = Result<EntryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(r)) => Some(Ok(r)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::MemoryByteSource;
    use crate::codec::ByteWriter;
    use std::sync::Arc;

    fn build_minimal_archive(names: &[&str]) -> Vec<u8> {
        let mut out = ByteWriter::new();
        let mut cd_entries = Vec::new();
        for name in names {
            let offset = out.len() as u32;
            out.u32(LOCAL_FILE_HEADER_SIGNATURE);
            out.u16(VERSION_DEFAULT);
            out.u16(0);
            out.u16(METHOD_STORE);
            out.u16(0).u16(0);
            let crc = crc32fast::hash(name.as_bytes());
            out.u32(crc);
            out.u32(name.len() as u32);
            out.u32(name.len() as u32);
            out.u16(name.len() as u16);
            out.u16(0);
            out.bytes(name.as_bytes());
            out.bytes(name.as_bytes());
            cd_entries.push((name.to_string(), offset, crc));
        }
        let cd_offset = out.len() as u32;
        for (name, offset, crc) in &cd_entries {
            out.u32(CENTRAL_DIRECTORY_SIGNATURE);
            out.u16(VERSION_DEFAULT);
            out.u16(VERSION_DEFAULT);
            out.u16(0);
            out.u16(METHOD_STORE);
            out.u16(0).u16(0);
            out.u32(*crc);
            out.u32(name.len() as u32);
            out.u32(name.len() as u32);
            out.u16(name.len() as u16);
            out.u16(0);
            out.u16(0);
            out.u16(0);
            out.u16(0);
            out.u32(0);
            out.u32(*offset);
            out.bytes(name.as_bytes());
        }
        let cd_size = out.len() as u32 - cd_offset;
        out.u32(EOCD_SIGNATURE);
        out.u16(0).u16(0);
        out.u16(names.len() as u16);
        out.u16(names.len() as u16);
        out.u32(cd_size);
        out.u32(cd_offset);
        out.u16(0);
        out.into_vec()
    }

    #[test]
    fn locates_classic_eocd() {
        let archive = build_minimal_archive(&["a.txt", "b.txt"]);
        let source = MemoryByteSource::new(Arc::from(archive.as_slice()));
        let location = locate(&source).unwrap();
        assert!(!location.is_zip64);
        assert_eq!(location.total_entries, 2);
    }

    #[test]
    fn iterates_all_entries_in_order() {
        let archive = build_minimal_archive(&["a.txt", "b.txt", "c.txt"]);
        let source: Rc<dyn ByteSource> = Rc::new(MemoryByteSource::new(Arc::from(archive.as_slice())));
        let location = locate(source.as_ref()).unwrap();
        let iter = CentralDirectoryIterator::new(source, &location, 16);
        let names: Vec<String> = iter.map(|r| r.unwrap().decoded_name()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn small_buffer_still_iterates_many_entries() {
        let names: Vec<String> = (0..500).map(|i| format!("f{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let archive = build_minimal_archive(&name_refs);
        let source: Rc<dyn ByteSource> = Rc::new(MemoryByteSource::new(Arc::from(archive.as_slice())));
        let location = locate(source.as_ref()).unwrap();
        let iter = CentralDirectoryIterator::new(source, &location, 32);
        let count = iter.map(|r| r.unwrap()).count();
        assert_eq!(count, 500);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut archive = build_minimal_archive(&["a.txt"]);
        // Corrupt the central directory signature's first byte.
        let cd_sig_pos = archive
            .windows(4)
            .position(|w| w == CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())
            .unwrap();
        archive[cd_sig_pos] = 0;
        let source: Rc<dyn ByteSource> = Rc::new(MemoryByteSource::new(Arc::from(archive.as_slice())));
        let location = locate(source.as_ref()).unwrap();
        let mut iter = CentralDirectoryIterator::new(source, &location, 16);
        assert!(matches!(iter.next(), Some(Err(FluxZipError::Malformed(_)))));
    }
}
