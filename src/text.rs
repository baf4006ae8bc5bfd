//! CP437 / UTF-8 decoding policy (§4.4).
//!
//! The actual code-page table lookup is delegated to the `codepage_437` crate, matching how
//! `mrkline-piz-rs` (the closest CP437-aware reader in the pack) handles it — the teacher crate
//! has no CP437 support of its own to generalize from.

use codepage_437::{BorrowFromCp437, IntoCp437, CP437_CONTROL};
use std::borrow::Cow;

use crate::error::{FluxZipError, Result};
use crate::extra::ExtraField;

/// Decodes a raw name or comment byte string per §4.4:
///
/// - if `utf8_flag` is set, the bytes are UTF-8 outright;
/// - otherwise, a Unicode extra field (Path or Comment) whose embedded CRC-32 matches `raw`
///   takes precedence;
/// - otherwise, the bytes are CP437.
pub fn decode_name_or_comment(raw: &[u8], utf8_flag: bool, unicode_override: Option<&[u8]>) -> String {
    if utf8_flag {
        return String::from_utf8_lossy(raw).into_owned();
    }
    if let Some(utf8_bytes) = unicode_override {
        if let Ok(s) = std::str::from_utf8(utf8_bytes) {
            return s.to_string();
        }
    }
    match Cow::borrow_from_cp437(raw, &CP437_CONTROL) {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}

/// Finds a Unicode Path/Comment extra field whose embedded CRC-32 matches `classic_bytes`, per
/// §8 property 9 ("Unicode override"). Returns `None` if no candidate validates, in which case
/// the caller falls back to CP437.
pub fn unicode_override<'a>(
    fields: &'a [ExtraField],
    classic_bytes: &[u8],
    want_path: bool,
) -> Option<&'a [u8]> {
    let expected_crc = crc32fast::hash(classic_bytes);
    fields.iter().find_map(|f| match f {
        ExtraField::UnicodePath {
            name_crc32,
            utf8_name,
        } if want_path && *name_crc32 == expected_crc => Some(utf8_name.as_slice()),
        ExtraField::UnicodeComment {
            comment_crc32,
            utf8_comment,
        } if !want_path && *comment_crc32 == expected_crc => Some(utf8_comment.as_slice()),
        _ => None,
    })
}

/// Chooses an emission encoding for a name/comment per §4.4's writer rules.
pub enum Emission {
    /// Encode as UTF-8 directly and set the general-purpose UTF-8 bit.
    Utf8(Vec<u8>),
    /// Encode as CP437, optionally paired with a Unicode extra field carrying the UTF-8 form.
    Cp437 {
        classic_bytes: Vec<u8>,
        unicode_field: Option<Vec<u8>>,
    },
}

/// Implements the writer-side encoding decision: UTF-8 when `force_utf8` is set or the text
/// isn't representable in CP437, else CP437 (optionally with a Unicode extra field).
pub fn encode_name_or_comment(text: &str, force_utf8: bool, emit_unicode_field: bool) -> Result<Emission> {
    if force_utf8 {
        return Ok(Emission::Utf8(text.as_bytes().to_vec()));
    }
    match text.into_cp437(&CP437_CONTROL) {
        Ok(classic_bytes) => {
            let unicode_field = if emit_unicode_field && !text.is_ascii() {
                Some(text.as_bytes().to_vec())
            } else {
                None
            };
            Ok(Emission::Cp437 {
                classic_bytes,
                unicode_field,
            })
        }
        Err(_) => {
            if text.is_ascii() {
                // Should not happen (ASCII is always CP437-representable) but fall back safely.
                Ok(Emission::Utf8(text.as_bytes().to_vec()))
            } else {
                Err(FluxZipError::EncodingUnsupported(text.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_decodes_identically_under_either_flag() {
        assert_eq!(decode_name_or_comment(b"hello.txt", false, None), "hello.txt");
        assert_eq!(decode_name_or_comment(b"hello.txt", true, None), "hello.txt");
    }

    #[test]
    fn unicode_override_requires_matching_crc() {
        let classic = b"na\xefve.txt";
        let utf8 = "naive.txt".as_bytes().to_vec();
        let fields = vec![ExtraField::UnicodePath {
            name_crc32: crc32fast::hash(b"different bytes"),
            utf8_name: utf8,
        }];
        assert!(unicode_override(&fields, classic, true).is_none());
    }

    #[test]
    fn unicode_override_accepted_on_matching_crc() {
        let classic = b"plain.txt";
        let utf8 = "plain.txt".as_bytes().to_vec();
        let fields = vec![ExtraField::UnicodePath {
            name_crc32: crc32fast::hash(classic),
            utf8_name: utf8.clone(),
        }];
        assert_eq!(unicode_override(&fields, classic, true), Some(utf8.as_slice()));
    }

    #[test]
    fn force_utf8_sets_utf8_bit_regardless_of_cp437_representability() {
        match encode_name_or_comment("plain", true, true).unwrap() {
            Emission::Utf8(bytes) => assert_eq!(bytes, b"plain"),
            _ => panic!("expected UTF-8 emission"),
        }
    }
}
