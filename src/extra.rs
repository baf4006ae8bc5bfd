//! Extra-field registry: parses and emits the extra-field tags this crate understands, and
//! preserves all others verbatim (see §4, "ExtraField").

use crate::codec::{ByteReader, ByteWriter};
use crate::constants::{
    EXTRA_TAG_TIMESTAMP, EXTRA_TAG_UNICODE_COMMENT, EXTRA_TAG_UNICODE_PATH, EXTRA_TAG_ZIP64,
};
use crate::error::Result;

/// Which classic (32-bit) fields were sentinel values, telling the ZIP64 extra-field parser
/// which 8-byte quantities to expect, in the fixed order APPNOTE mandates: uncompressed size,
/// compressed size, local header offset, disk start.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zip64Sentinels {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub local_header_offset: bool,
    pub disk_start: bool,
}

/// A decoded extra field. Unknown tags are preserved byte-for-byte so a merge that copies an
/// entry's extra-field blob unchanged reproduces it exactly (§8 property 8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    Zip64 {
        uncompressed_size: Option<u64>,
        compressed_size: Option<u64>,
        local_header_offset: Option<u64>,
        disk_start: Option<u32>,
    },
    UnicodePath {
        name_crc32: u32,
        utf8_name: Vec<u8>,
    },
    UnicodeComment {
        comment_crc32: u32,
        utf8_comment: Vec<u8>,
    },
    Timestamp {
        mtime: Option<u32>,
        atime: Option<u32>,
        ctime: Option<u32>,
    },
    Unknown {
        tag: u16,
        data: Vec<u8>,
    },
}

/// Parses a raw extra-field blob into a sequence of tagged fields.
///
/// `sentinels` tells the ZIP64 tag (0x0001) parser which values are present in this occurrence
/// — local headers and central directory headers both use the same tag, but a local header
/// never carries a disk-start field and may omit the offset, so the set of sentinel classic
/// fields is the only way to know the tag's internal layout (see APPNOTE 4.5.3).
pub fn parse(blob: &[u8], sentinels: Zip64Sentinels) -> Result<Vec<ExtraField>> {
    let mut fields = Vec::new();
    let mut pos = 0usize;
    while pos + 4 <= blob.len() {
        let mut header = ByteReader::new(&blob[pos..pos + 4]);
        let tag = header.u16()?;
        let data_len = header.u16()? as usize;
        pos += 4;
        if pos + data_len > blob.len() {
            // A truncated trailing extra field is tolerated as unknown/ignorable noise rather
            // than a hard parse failure — some writers pad short.
            break;
        }
        let data = &blob[pos..pos + data_len];
        pos += data_len;

        match tag {
            EXTRA_TAG_ZIP64 => fields.push(parse_zip64(data, sentinels)?),
            EXTRA_TAG_UNICODE_PATH => {
                if let Some(f) = parse_unicode(data, true) {
                    fields.push(f);
                }
            }
            EXTRA_TAG_UNICODE_COMMENT => {
                if let Some(f) = parse_unicode(data, false) {
                    fields.push(f);
                }
            }
            EXTRA_TAG_TIMESTAMP => fields.push(parse_timestamp(data)),
            other => fields.push(ExtraField::Unknown {
                tag: other,
                data: data.to_vec(),
            }),
        }
    }
    Ok(fields)
}

fn parse_zip64(data: &[u8], sentinels: Zip64Sentinels) -> Result<ExtraField> {
    let mut r = ByteReader::new(data);
    let mut uncompressed_size = None;
    let mut compressed_size = None;
    let mut local_header_offset = None;
    let mut disk_start = None;

    if sentinels.uncompressed_size && r.remaining() >= 8 {
        uncompressed_size = Some(r.u64()?);
    }
    if sentinels.compressed_size && r.remaining() >= 8 {
        compressed_size = Some(r.u64()?);
    }
    if sentinels.local_header_offset && r.remaining() >= 8 {
        local_header_offset = Some(r.u64()?);
    }
    if sentinels.disk_start && r.remaining() >= 4 {
        disk_start = Some(r.u32()?);
    }

    Ok(ExtraField::Zip64 {
        uncompressed_size,
        compressed_size,
        local_header_offset,
        disk_start,
    })
}

fn parse_unicode(data: &[u8], is_path: bool) -> Option<ExtraField> {
    if data.len() < 5 {
        return None;
    }
    let version = data[0];
    if version != 1 {
        return None;
    }
    let crc32 = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
    let payload = data[5..].to_vec();
    Some(if is_path {
        ExtraField::UnicodePath {
            name_crc32: crc32,
            utf8_name: payload,
        }
    } else {
        ExtraField::UnicodeComment {
            comment_crc32: crc32,
            utf8_comment: payload,
        }
    })
}

fn parse_timestamp(data: &[u8]) -> ExtraField {
    if data.is_empty() {
        return ExtraField::Timestamp {
            mtime: None,
            atime: None,
            ctime: None,
        };
    }
    let flags = data[0];
    let mut cursor = 1usize;
    let mut read_time = |present: bool| -> Option<u32> {
        if present && cursor + 4 <= data.len() {
            let v = u32::from_le_bytes([
                data[cursor],
                data[cursor + 1],
                data[cursor + 2],
                data[cursor + 3],
            ]);
            cursor += 4;
            Some(v)
        } else {
            None
        }
    };
    let mtime = read_time(flags & 0x1 != 0);
    let atime = read_time(flags & 0x2 != 0);
    let ctime = read_time(flags & 0x4 != 0);
    ExtraField::Timestamp {
        mtime,
        atime,
        ctime,
    }
}

/// Encodes one extra field back into its tagged, length-prefixed wire form.
pub fn emit_one(field: &ExtraField, out: &mut ByteWriter) {
    match field {
        ExtraField::Zip64 {
            uncompressed_size,
            compressed_size,
            local_header_offset,
            disk_start,
        } => {
            let mut data = ByteWriter::new();
            if let Some(v) = uncompressed_size {
                data.u64(*v);
            }
            if let Some(v) = compressed_size {
                data.u64(*v);
            }
            if let Some(v) = local_header_offset {
                data.u64(*v);
            }
            if let Some(v) = disk_start {
                data.u32(*v);
            }
            let data = data.into_vec();
            if data.is_empty() {
                return;
            }
            out.u16(EXTRA_TAG_ZIP64);
            out.u16(data.len() as u16);
            out.bytes(&data);
        }
        ExtraField::UnicodePath {
            name_crc32,
            utf8_name,
        } => {
            out.u16(EXTRA_TAG_UNICODE_PATH);
            out.u16((5 + utf8_name.len()) as u16);
            out.u8(1);
            out.u32(*name_crc32);
            out.bytes(utf8_name);
        }
        ExtraField::UnicodeComment {
            comment_crc32,
            utf8_comment,
        } => {
            out.u16(EXTRA_TAG_UNICODE_COMMENT);
            out.u16((5 + utf8_comment.len()) as u16);
            out.u8(1);
            out.u32(*comment_crc32);
            out.bytes(utf8_comment);
        }
        ExtraField::Timestamp {
            mtime,
            atime,
            ctime,
        } => {
            let mut flags = 0u8;
            if mtime.is_some() {
                flags |= 0x1;
            }
            if atime.is_some() {
                flags |= 0x2;
            }
            if ctime.is_some() {
                flags |= 0x4;
            }
            let mut data = ByteWriter::new();
            data.u8(flags);
            if let Some(v) = mtime {
                data.u32(*v);
            }
            if let Some(v) = atime {
                data.u32(*v);
            }
            if let Some(v) = ctime {
                data.u32(*v);
            }
            let data = data.into_vec();
            out.u16(EXTRA_TAG_TIMESTAMP);
            out.u16(data.len() as u16);
            out.bytes(&data);
        }
        ExtraField::Unknown { tag, data } => {
            out.u16(*tag);
            out.u16(data.len() as u16);
            out.bytes(data);
        }
    }
}

/// Encodes a full sequence of extra fields into one blob.
pub fn emit(fields: &[ExtraField]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    for field in fields {
        emit_one(field, &mut out);
    }
    out.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip64_field_round_trips_all_present() {
        let field = ExtraField::Zip64 {
            uncompressed_size: Some(0x1_0000_0001),
            compressed_size: Some(12345),
            local_header_offset: Some(999),
            disk_start: None,
        };
        let blob = emit(&[field.clone()]);
        let sentinels = Zip64Sentinels {
            uncompressed_size: true,
            compressed_size: true,
            local_header_offset: true,
            disk_start: false,
        };
        let parsed = parse(&blob, sentinels).unwrap();
        assert_eq!(parsed, vec![field]);
    }

    #[test]
    fn unicode_path_round_trips() {
        let field = ExtraField::UnicodePath {
            name_crc32: 0xDEADBEEF,
            utf8_name: b"h\xc3\xa9llo".to_vec(),
        };
        let blob = emit(&[field.clone()]);
        let parsed = parse(&blob, Zip64Sentinels::default()).unwrap();
        assert_eq!(parsed, vec![field]);
    }

    #[test]
    fn unknown_tag_preserved_verbatim() {
        let field = ExtraField::Unknown {
            tag: 0x9999,
            data: vec![1, 2, 3, 4],
        };
        let blob = emit(&[field.clone()]);
        let parsed = parse(&blob, Zip64Sentinels::default()).unwrap();
        assert_eq!(parsed, vec![field]);
    }

    #[test]
    fn timestamp_mtime_only() {
        let field = ExtraField::Timestamp {
            mtime: Some(1_700_000_000),
            atime: None,
            ctime: None,
        };
        let blob = emit(&[field.clone()]);
        let parsed = parse(&blob, Zip64Sentinels::default()).unwrap();
        assert_eq!(parsed, vec![field]);
    }
}
