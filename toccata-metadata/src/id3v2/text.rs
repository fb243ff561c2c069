// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Text encodings for ID3v2 frames.

use std::char;

use encoding_rs::{UTF_16BE, UTF_16LE};

use toccata_core::errors::{decode_error, Result};
use toccata_core::io::{BufReader, FiniteStream};

/// Enumeration of valid encodings for text fields in ID3v2 tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// ISO-8859-1 (aka Latin-1) characters in the range 0x20-0xFF.
    Iso8859_1,
    /// UTF-16 (or UCS-2) with a byte-order-mark (BOM). If the BOM is missing, big-endian
    /// encoding is assumed.
    Utf16Bom,
    /// UTF-16 big-endian without a byte-order-mark (BOM).
    Utf16Be,
    /// UTF-8.
    Utf8,
}

impl Encoding {
    /// Parse an encoding indicator byte.
    pub fn parse(encoding: u8) -> Option<Encoding> {
        match encoding {
            // ISO-8859-1 terminated with 0x00.
            0 => Some(Encoding::Iso8859_1),
            // UTF-16 with byte order marker (BOM), terminated with 0x00 0x00.
            1 => Some(Encoding::Utf16Bom),
            // UTF-16BE without byte order marker (BOM), terminated with 0x00 0x00.
            2 => Some(Encoding::Utf16Be),
            // UTF-8 terminated with 0x00.
            3 => Some(Encoding::Utf8),
            // Invalid encoding.
            _ => None,
        }
    }

    /// The width in bytes of one encoded code unit, and therefore of the null terminator.
    fn unit_len(&self) -> usize {
        match self {
            Encoding::Iso8859_1 | Encoding::Utf8 => 1,
            Encoding::Utf16Bom | Encoding::Utf16Be => 2,
        }
    }
}

/// A Unicode encoding identified by its byte-order-mark.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BomEncoding {
    /// No recognizable byte-order-mark.
    None,
    Utf16Be,
    Utf16Le,
    Utf8,
    Utf32Be,
    Utf32Le,
    Utf7,
}

/// Detect a leading byte-order-mark, returning the encoding it identifies and the number of
/// bytes it occupies.
pub fn detect_bom(buf: &[u8]) -> (BomEncoding, usize) {
    match buf {
        [0x00, 0x00, 0xfe, 0xff, ..] => (BomEncoding::Utf32Be, 4),
        // A little-endian BOM followed by two nulls reads as UTF-32LE.
        [0xff, 0xfe, 0x00, 0x00, ..] => (BomEncoding::Utf32Le, 4),
        [0xfe, 0xff, ..] => (BomEncoding::Utf16Be, 2),
        [0xff, 0xfe, ..] => (BomEncoding::Utf16Le, 2),
        [0xef, 0xbb, 0xbf, ..] => (BomEncoding::Utf8, 3),
        [0x2b, 0x2f, 0x76, 0x38 | 0x39 | 0x2b | 0x2f, ..] => (BomEncoding::Utf7, 4),
        _ => (BomEncoding::None, 0),
    }
}

/// Decodes a slice of bytes containing encoded text into a `String`.
///
/// The ID3v2 specification forbids all control characters other than line-feed on the
/// ISO-8859-1 text encoding, however, does not state if the same limitation applies to the
/// Unicode encodings. Therefore, this restriction is not applied to other encodings.
///
/// Returns a decode error when the byte-order-mark identifies an encoding with no decoder
/// (UTF-32 and UTF-7); the caller keeps the raw payload in that case.
pub fn decode_text_buf(buf: &[u8], encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Iso8859_1 => Ok(decode_id3v2_iso8859_1(buf).collect()),
        Encoding::Utf8 => Ok(String::from_utf8_lossy(buf).into_owned()),
        Encoding::Utf16Be => Ok(UTF_16BE.decode_without_bom_handling(buf).0.into_owned()),
        Encoding::Utf16Bom => match detect_bom(buf) {
            (BomEncoding::Utf16Be, len) => {
                Ok(UTF_16BE.decode_without_bom_handling(&buf[len..]).0.into_owned())
            }
            (BomEncoding::Utf16Le, len) => {
                Ok(UTF_16LE.decode_without_bom_handling(&buf[len..]).0.into_owned())
            }
            (BomEncoding::Utf8, len) => Ok(String::from_utf8_lossy(&buf[len..]).into_owned()),
            // A missing BOM is tolerated by assuming big-endian.
            (BomEncoding::None, _) => Ok(UTF_16BE.decode_without_bom_handling(buf).0.into_owned()),
            (BomEncoding::Utf32Be | BomEncoding::Utf32Le, _) => {
                decode_error("id3v2: utf-32 encoded text is not supported")
            }
            (BomEncoding::Utf7, _) => decode_error("id3v2: utf-7 encoded text is not supported"),
        },
    }
}

fn decode_id3v2_iso8859_1(buf: &[u8]) -> impl Iterator<Item = char> + '_ {
    buf.iter().map(|&c| {
        match c {
            // C0 control codes excluding line-feed.
            0x00..=0x09 | 0x0b..=0x1f => char::REPLACEMENT_CHARACTER,
            // C1 control codes.
            0x80..=0x9f => char::REPLACEMENT_CHARACTER,
            // All other non-control characters.
            _ => char::from(c),
        }
    })
}

/// Trim one trailing null terminator of the encoding's width, if present.
pub fn trim_terminator(buf: &[u8], encoding: Encoding) -> &[u8] {
    let unit = encoding.unit_len();

    match buf.len() >= unit && buf[buf.len() - unit..].iter().all(|&b| b == 0) {
        true => &buf[..buf.len() - unit],
        false => buf,
    }
}

/// Read a null-terminated string of the specified encoding from the stream. If the stream ends
/// before the null-terminator is reached, all the bytes up-to that point are interpreted as the
/// string. The terminator is consumed but not part of the returned string.
pub fn read_string(reader: &mut BufReader<'_>, encoding: Encoding) -> Result<String> {
    let max_len = reader.bytes_available() as usize;
    let unit = encoding.unit_len();
    let terminator: &[u8] = if unit == 1 { &[0x00] } else { &[0x00, 0x00] };

    let buf = reader.scan_bytes_aligned_ref(terminator, unit, max_len)?;

    // Terminators and stray trailing nulls (alignment slack) decode to an empty string.
    if buf.iter().all(|&b| b == 0) {
        return Ok(String::new());
    }

    decode_text_buf(trim_terminator(buf, encoding), encoding)
}

/// Same behaviour as `read_string`, but maps empty strings to `None`.
pub fn read_string_ignore_empty(
    reader: &mut BufReader<'_>,
    encoding: Encoding,
) -> Result<Option<String>> {
    Ok(Some(read_string(reader, encoding)?).filter(|text| !text.is_empty()))
}

/// Reads a list of null-separated strings until the stream is exhausted.
///
/// An empty stream yields a single empty string. A single empty trailing segment (one
/// superfluous terminator at the end of the stream) is dropped.
pub fn read_string_list(reader: &mut BufReader<'_>, encoding: Encoding) -> Result<Vec<String>> {
    let mut items = Vec::new();

    // Read the first string. If the reader is empty, this pushes an empty string.
    items.push(read_string(reader, encoding)?);

    // Read additional strings.
    while reader.bytes_available() > 0 {
        items.push(read_string(reader, encoding)?);
    }

    // Drop one empty trailing segment.
    if items.len() > 1 && items.last().map(|item| item.is_empty()).unwrap_or(false) {
        items.pop();
    }

    Ok(items)
}
