// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ID3v2 frame readers.
//!
//! A frame is one field of an ID3v2 tag. The differences between the tag versions are carried
//! as data here: the frame-header geometry and size-bit width live on a [`VersionInfo`], and
//! the per-version flag layouts are decoded into one normalized [`FrameFlags`] before use.

use std::borrow::Cow;
use std::collections::HashMap;

use bitflags::bitflags;
use lazy_static::lazy_static;
use log::warn;

use toccata_core::errors::Result;
use toccata_core::io::{BufReader, FiniteStream};
use toccata_core::meta::{Field, FieldId, Value};
use toccata_core::registry::{DecodeContext, FieldDecoderFn, FormatRegistry};
use toccata_core::util::bits::parse_unsigned_be;

use crate::id3v2::unsync;

mod readers;

use readers::*;

/// The frame-header geometry of one ID3v2 major version.
pub struct VersionInfo {
    /// The tag's major version number.
    pub major: u8,
    /// The format name the version registers under.
    pub format_name: &'static str,
    /// The frame header length in bytes.
    pub header_len: usize,
    /// The number of significant bits per frame-size byte (7 makes the size syncsafe).
    pub size_bits: u32,
}

pub const ID3V2P2: VersionInfo =
    VersionInfo { major: 2, format_name: "ID3v2.2", header_len: 6, size_bits: 8 };
pub const ID3V2P3: VersionInfo =
    VersionInfo { major: 3, format_name: "ID3v2.3", header_len: 10, size_bits: 8 };
pub const ID3V2P4: VersionInfo =
    VersionInfo { major: 4, format_name: "ID3v2.4", header_len: 10, size_bits: 7 };

/// Find the version descriptor for a registered format name.
pub fn version_by_format(name: &str) -> Option<&'static VersionInfo> {
    match name {
        "ID3v2.2" => Some(&ID3V2P2),
        "ID3v2.3" => Some(&ID3V2P3),
        "ID3v2.4" => Some(&ID3V2P4),
        _ => None,
    }
}

// Frame flag bits with no assigned meaning, per version. Taken verbatim from the
// specification; must not be tightened.
const UNKNOWN_FLAG_MASK_2P3: u16 = 0x1f1f;
const UNKNOWN_FLAG_MASK_2P4: u16 = 0x8fb0;

bitflags! {
    /// ID3v2.3 frame header flags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct FrameFlags2p3: u16 {
        const DISCARD_ON_TAG_EDIT  = 0x8000;
        const DISCARD_ON_FILE_EDIT = 0x4000;
        const READ_ONLY            = 0x2000;
        const COMPRESSED           = 0x0080;
        const ENCRYPTED            = 0x0040;
        const GROUPED              = 0x0020;
    }
}

bitflags! {
    /// ID3v2.4 frame header flags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    struct FrameFlags2p4: u16 {
        const DISCARD_ON_TAG_EDIT  = 0x4000;
        const DISCARD_ON_FILE_EDIT = 0x2000;
        const READ_ONLY            = 0x1000;
        const GROUPED              = 0x0040;
        const COMPRESSED           = 0x0008;
        const ENCRYPTED            = 0x0004;
        const UNSYNCHRONISED       = 0x0002;
        const DATA_LENGTH          = 0x0001;
    }
}

/// Normalized frame flags, independent of the tag version.
#[derive(Default)]
struct FrameFlags {
    compressed: bool,
    encrypted: bool,
    grouped: bool,
    unsynchronised: bool,
    has_data_length: bool,
    unknown_bits: u16,
}

fn decode_frame_flags(major: u8, bits: u16) -> FrameFlags {
    match major {
        3 => {
            let known = FrameFlags2p3::from_bits_truncate(bits);

            FrameFlags {
                compressed: known.contains(FrameFlags2p3::COMPRESSED),
                encrypted: known.contains(FrameFlags2p3::ENCRYPTED),
                grouped: known.contains(FrameFlags2p3::GROUPED),
                unsynchronised: false,
                has_data_length: false,
                unknown_bits: bits & UNKNOWN_FLAG_MASK_2P3,
            }
        }
        4 => {
            let known = FrameFlags2p4::from_bits_truncate(bits);

            FrameFlags {
                compressed: known.contains(FrameFlags2p4::COMPRESSED),
                encrypted: known.contains(FrameFlags2p4::ENCRYPTED),
                grouped: known.contains(FrameFlags2p4::GROUPED),
                unsynchronised: known.contains(FrameFlags2p4::UNSYNCHRONISED),
                has_data_length: known.contains(FrameFlags2p4::DATA_LENGTH),
                unknown_bits: bits & UNKNOWN_FLAG_MASK_2P4,
            }
        }
        _ => Default::default(),
    }
}

lazy_static! {
    /// Maps legacy 3 character ID3v2.2 frame identifiers to their modern equivalents.
    static ref LEGACY_FRAME_MAP: HashMap<&'static [u8; 3], &'static [u8; 4]> = {
        let mut m = HashMap::new();
        m.insert(b"BUF", b"RBUF");
        m.insert(b"CNT", b"PCNT");
        m.insert(b"COM", b"COMM");
        m.insert(b"CRA", b"AENC");
        m.insert(b"EQU", b"EQUA");
        m.insert(b"ETC", b"ETCO");
        m.insert(b"GEO", b"GEOB");
        m.insert(b"IPL", b"IPLS");
        m.insert(b"LNK", b"LINK");
        m.insert(b"MCI", b"MCDI");
        m.insert(b"MLL", b"MLLT");
        m.insert(b"PCS", b"PCST");
        m.insert(b"PIC", b"APIC");
        m.insert(b"POP", b"POPM");
        m.insert(b"REV", b"RVRB");
        m.insert(b"RVA", b"RVAD");
        m.insert(b"SLT", b"SYLT");
        m.insert(b"STC", b"SYTC");
        m.insert(b"TAL", b"TALB");
        m.insert(b"TBP", b"TBPM");
        m.insert(b"TCM", b"TCOM");
        m.insert(b"TCO", b"TCON");
        m.insert(b"TCP", b"TCMP");
        m.insert(b"TCR", b"TCOP");
        m.insert(b"TDA", b"TDAT");
        m.insert(b"TDY", b"TDLY");
        m.insert(b"TEN", b"TENC");
        m.insert(b"TFT", b"TFLT");
        m.insert(b"TIM", b"TIME");
        m.insert(b"TKE", b"TKEY");
        m.insert(b"TLA", b"TLAN");
        m.insert(b"TLE", b"TLEN");
        m.insert(b"TMT", b"TMED");
        m.insert(b"TOA", b"TOPE");
        m.insert(b"TOF", b"TOFN");
        m.insert(b"TOL", b"TOLY");
        m.insert(b"TOR", b"TORY");
        m.insert(b"TOT", b"TOAL");
        m.insert(b"TP1", b"TPE1");
        m.insert(b"TP2", b"TPE2");
        m.insert(b"TP3", b"TPE3");
        m.insert(b"TP4", b"TPE4");
        m.insert(b"TPA", b"TPOS");
        m.insert(b"TPB", b"TPUB");
        m.insert(b"TRC", b"TSRC");
        m.insert(b"TRD", b"TRDA");
        m.insert(b"TRK", b"TRCK");
        m.insert(b"TS2", b"TSO2");
        m.insert(b"TSA", b"TSOA");
        m.insert(b"TSC", b"TSOC");
        m.insert(b"TSI", b"TSIZ");
        m.insert(b"TSP", b"TSOP");
        m.insert(b"TSS", b"TSSE");
        m.insert(b"TST", b"TSOT");
        m.insert(b"TT1", b"TIT1");
        m.insert(b"TT2", b"TIT2");
        m.insert(b"TT3", b"TIT3");
        m.insert(b"TXT", b"TEXT");
        m.insert(b"TXX", b"TXXX");
        m.insert(b"TYE", b"TYER");
        m.insert(b"UFI", b"UFID");
        m.insert(b"ULT", b"USLT");
        m.insert(b"WAF", b"WOAF");
        m.insert(b"WAR", b"WOAR");
        m.insert(b"WAS", b"WOAS");
        m.insert(b"WCM", b"WCOM");
        m.insert(b"WCP", b"WCOP");
        m.insert(b"WPB", b"WPUB");
        m.insert(b"WXX", b"WXXX");
        m
    };
}

/// Frame decoders shared by ID3v2.3 and ID3v2.4, keyed by frame identifier.
const FRAME_DECODERS: &[(&[u8; 4], FieldDecoderFn)] = &[
    (b"AENC", read_aenc_frame),
    (b"APIC", read_image_frame),
    (b"ASPI", read_raw_frame),
    (b"CHAP", read_chap_frame),
    (b"COMM", read_long_text_frame),
    (b"COMR", read_comr_frame),
    (b"CTOC", read_ctoc_frame),
    (b"ENCR", read_encr_frame),
    (b"EQU2", read_raw_frame),
    (b"EQUA", read_raw_frame),
    (b"ETCO", read_raw_frame),
    (b"GEOB", read_geob_frame),
    (b"GRID", read_grid_frame),
    (b"GRP1", read_text_frame),
    (b"IPLS", read_credit_frame),
    (b"LINK", read_raw_frame),
    (b"MCDI", read_mcdi_frame),
    (b"MLLT", read_raw_frame),
    (b"MVIN", read_text_frame),
    (b"MVNM", read_text_frame),
    (b"OWNE", read_owne_frame),
    (b"PCNT", read_pcnt_frame),
    (b"PCST", read_text_frame),
    (b"POPM", read_popm_frame),
    (b"POSS", read_poss_frame),
    (b"PRIV", read_priv_frame),
    (b"RBUF", read_raw_frame),
    (b"RVA2", read_raw_frame),
    (b"RVAD", read_raw_frame),
    (b"RVRB", read_raw_frame),
    (b"SEEK", read_raw_frame),
    (b"SIGN", read_sign_frame),
    (b"SYLT", read_raw_frame),
    (b"SYTC", read_raw_frame),
    (b"TALB", read_text_frame),
    (b"TBPM", read_text_frame),
    (b"TCAT", read_text_frame),
    (b"TCMP", read_keyed_lookup_frame),
    (b"TCOM", read_text_frame),
    (b"TCON", read_genre_frame),
    (b"TCOP", read_copyright_frame),
    (b"TDAT", read_text_frame),
    (b"TDEN", read_timestamp_frame),
    (b"TDES", read_text_frame),
    (b"TDLY", read_millis_frame),
    (b"TDOR", read_timestamp_frame),
    (b"TDRC", read_timestamp_frame),
    (b"TDRL", read_timestamp_frame),
    (b"TDTG", read_timestamp_frame),
    (b"TENC", read_text_frame),
    (b"TEXT", read_text_frame),
    (b"TFLT", read_keyed_lookup_frame),
    (b"TGID", read_text_frame),
    (b"TIME", read_text_frame),
    (b"TIPL", read_credit_frame),
    (b"TIT1", read_text_frame),
    (b"TIT2", read_text_frame),
    (b"TIT3", read_text_frame),
    (b"TKEY", read_key_frame),
    (b"TKWD", read_text_frame),
    (b"TLAN", read_language_frame),
    (b"TLEN", read_millis_frame),
    (b"TMCL", read_credit_frame),
    (b"TMED", read_keyed_lookup_frame),
    (b"TMOO", read_text_frame),
    (b"TOAL", read_text_frame),
    (b"TOFN", read_text_frame),
    (b"TOLY", read_text_frame),
    (b"TOPE", read_text_frame),
    (b"TORY", read_text_frame),
    (b"TOWN", read_text_frame),
    (b"TPE1", read_text_frame),
    (b"TPE2", read_text_frame),
    (b"TPE3", read_text_frame),
    (b"TPE4", read_text_frame),
    (b"TPOS", read_of_number_frame),
    (b"TPRO", read_copyright_frame),
    (b"TPUB", read_text_frame),
    (b"TRCK", read_of_number_frame),
    (b"TRDA", read_text_frame),
    (b"TRSN", read_text_frame),
    (b"TRSO", read_text_frame),
    (b"TSIZ", read_text_frame),
    (b"TSO2", read_text_frame),
    (b"TSOA", read_text_frame),
    (b"TSOC", read_text_frame),
    (b"TSOP", read_text_frame),
    (b"TSOT", read_text_frame),
    (b"TSRC", read_isrc_frame),
    (b"TSSE", read_text_frame),
    (b"TSST", read_text_frame),
    (b"TXXX", read_user_text_frame),
    (b"TYER", read_text_frame),
    (b"UFID", read_ufid_frame),
    (b"USER", read_user_frame),
    (b"USLT", read_long_text_frame),
    (b"WCOM", read_url_frame),
    (b"WCOP", read_url_frame),
    (b"WFED", read_url_frame),
    (b"WOAF", read_url_frame),
    (b"WOAR", read_url_frame),
    (b"WOAS", read_url_frame),
    (b"WORS", read_url_frame),
    (b"WPAY", read_url_frame),
    (b"WPUB", read_url_frame),
    (b"WXXX", read_user_url_frame),
    (b"XSOA", read_text_frame),
    (b"XSOP", read_text_frame),
    (b"XSOT", read_text_frame),
];

/// ID3v2.3 overrides: frames whose values are additionally `/`-separated lists in that
/// version.
const FRAME_DECODERS_2P3: &[(&[u8; 4], FieldDecoderFn)] = &[
    (b"TCOM", read_slash_text_frame),
    (b"TEXT", read_slash_text_frame),
    (b"TOLY", read_slash_text_frame),
    (b"TOPE", read_slash_text_frame),
    (b"TPE1", read_slash_text_frame),
];

/// Register the frame decoder tables for the modern tag versions. ID3v2.2 frames resolve
/// through the legacy identifier map into the ID3v2.3 table.
pub fn register_frame_decoders(registry: &mut FormatRegistry) {
    for (id, decode) in FRAME_DECODERS {
        registry.register_field(ID3V2P3.format_name, FieldId(**id), ID3V2P3.header_len, *decode);
        registry.register_field(ID3V2P4.format_name, FieldId(**id), ID3V2P4.header_len, *decode);
    }

    for (id, decode) in FRAME_DECODERS_2P3 {
        registry.register_field(ID3V2P3.format_name, FieldId(**id), ID3V2P3.header_len, *decode);
    }
}

/// The result of reading one frame.
enum FrameResult {
    /// Padding was encountered instead of a frame. The remainder of the tag may be skipped.
    Padding,
    /// A frame was parsed into a field.
    Field(Field),
}

/// Validates that a frame id only contains uppercase letters (A-Z) and digits (0-9).
fn validate_frame_id(id: &[u8]) -> bool {
    id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Sort-order aliases: `XSO?` identifiers are aliased to their `TSO?` equivalents for name
/// resolution.
fn name_key(id: FieldId) -> FieldId {
    match id.as_bytes() {
        b"XSOA" => FieldId(*b"TSOA"),
        b"XSOP" => FieldId(*b"TSOP"),
        b"XSOT" => FieldId(*b"TSOT"),
        _ => id,
    }
}

/// Resolve the human-readable name of a frame through the localization lookup.
fn resolve_name(id: FieldId, ctx: &DecodeContext<'_>) -> Option<String> {
    ctx.lookup(&format!("Field_{}", name_key(id)))
}

/// Find the payload decoder for a frame identifier.
///
/// Identifiers are resolved through the version's registered field table first. Unregistered
/// identifiers fall back by family: `T`-prefixed frames decode as plain text and `W`-prefixed
/// frames as URLs.
fn find_decoder(
    version: &VersionInfo,
    id: FieldId,
    ctx: &DecodeContext<'_>,
) -> Option<FieldDecoderFn> {
    // ID3v2.2 registers no field table of its own; its identifiers resolve through the
    // ID3v2.3 table after the legacy mapping.
    let format = match version.major {
        2 => ID3V2P3.format_name,
        _ => version.format_name,
    };

    if let Some(descriptor) = ctx.registry.field_descriptor(format, id) {
        return Some(descriptor.decode);
    }

    match id.as_bytes() {
        [b'T', ..] => Some(read_text_frame),
        [b'W', ..] => Some(read_url_frame),
        _ => None,
    }
}

/// Read all frames in the tag body, stopping at padding, on a framing error, or when too few
/// bytes remain for another frame header.
pub fn read_frames(
    reader: &mut BufReader<'_>,
    version: &VersionInfo,
    ctx: &DecodeContext<'_>,
    fields: &mut Vec<Field>,
    warnings: &mut Vec<String>,
) {
    while reader.bytes_available() >= version.header_len as u64 {
        match read_frame(reader, version, ctx) {
            Ok(FrameResult::Padding) => break,
            Ok(FrameResult::Field(field)) => fields.push(field),
            Err(err) => {
                // The frame could not be framed; the rest of the tag cannot be walked.
                warn!("id3v2: {}", err);
                warnings.push(format!("a frame could not be framed: {}", err));
                break;
            }
        }
    }
}

/// Read one frame.
fn read_frame(
    reader: &mut BufReader<'_>,
    version: &VersionInfo,
    ctx: &DecodeContext<'_>,
) -> Result<FrameResult> {
    let header = reader.read_buf_bytes_ref(version.header_len)?;

    let id_len = if version.major == 2 { 3 } else { 4 };
    let id_bytes = &header[..id_len];

    // A zeroed id marks the start of padding. As per the specification padding should be all
    // zeros, but some tags put junk there; treat any invalid id as padding too.
    if id_bytes.iter().all(|&b| b == 0) {
        return Ok(FrameResult::Padding);
    }

    if !validate_frame_id(id_bytes) {
        warn!("id3v2: padding bytes not zero");
        return Ok(FrameResult::Padding);
    }

    // Legacy 3 character identifiers are padded for storage and mapped to their modern
    // equivalents for decoding.
    let (id, modern) = if version.major == 2 {
        let stored = FieldId([id_bytes[0], id_bytes[1], id_bytes[2], b' ']);
        let modern = LEGACY_FRAME_MAP
            .get(<&[u8; 3]>::try_from(id_bytes).expect("legacy id is 3 bytes"))
            .map(|mapped| FieldId(**mapped));
        (stored, modern)
    }
    else {
        let id = FieldId([id_bytes[0], id_bytes[1], id_bytes[2], id_bytes[3]]);
        (id, Some(id))
    };

    // The frame size, after any compression, encryption, and unsynchronisation.
    let size = match version.major {
        2 => parse_unsigned_be(&header[3..6], 8)?,
        _ => parse_unsigned_be(&header[4..8], version.size_bits)?,
    };

    let data = reader.read_buf_bytes_ref(size as usize)?;

    let mut field = Field::new(Box::from(header), Box::from(data), id);
    field.name = modern.and_then(|modern| resolve_name(modern, ctx));

    let flag_bits = match version.major {
        2 => 0,
        _ => u16::from_be_bytes([header[8], header[9]]),
    };

    let flags = decode_frame_flags(version.major, flag_bits);

    if version.major > 2 {
        field.flags = Some(flag_bits);

        if flags.unknown_bits != 0 {
            warn!("id3v2: unknown frame flag bits 0x{:04x}", flags.unknown_bits);
            field.push_warning(format!("unknown frame flag bits 0x{:04x}", flags.unknown_bits));
        }
    }

    // Reverse the per-frame unsynchronisation before consuming any flag data.
    let body: Cow<'_, [u8]> = if version.major == 4 && flags.unsynchronised {
        match unsync::decode_unsynchronisation(data) {
            Ok(decoded) => Cow::Owned(decoded),
            Err(err) => {
                warn!("id3v2: '{}' retained raw: {}", id, err);
                return Ok(FrameResult::Field(raw_field(field, data, err.to_string())));
            }
        }
    }
    else {
        Cow::Borrowed(data)
    };

    // Consume the flag data preceding the payload: the group identifier, the encryption
    // method, and the data length indicator (informational only).
    let mut at = 0;

    if flags.grouped {
        field.group = body.get(at).copied();
        at += 1;
    }

    if flags.encrypted {
        field.encryption_method = body.get(at).copied();
        at += 1;
    }

    if flags.has_data_length {
        at += 4;
    }

    if at > body.len() {
        return Ok(FrameResult::Field(raw_field(field, data, "the frame is too small".into())));
    }

    let payload = &body[at..];

    // Compression is vendor-ambiguous in v2.3 and zlib in v2.4; neither is inflated here.
    // Compressed and encrypted frames are retained raw.
    if flags.compressed || flags.encrypted {
        let reason = if flags.compressed { "compressed frame retained raw" }
                     else { "encrypted frame retained raw" };
        warn!("id3v2: '{}': {}", id, reason);
        return Ok(FrameResult::Field(raw_field(field, payload, reason.into())));
    }

    // A zero-length payload is valid; the field simply carries no values.
    if payload.is_empty() {
        return Ok(FrameResult::Field(field));
    }

    match modern.and_then(|modern| find_decoder(version, modern, ctx)) {
        Some(decode) => {
            if let Err(err) = decode(BufReader::new(payload), &mut field, ctx) {
                // A decoder error is not fatal to the tag; the field keeps its raw payload.
                warn!("id3v2: '{}' could not be decoded: {}", id, err);
                field.values.clear();
                return Ok(FrameResult::Field(raw_field(field, payload, err.to_string())));
            }

            Ok(FrameResult::Field(field))
        }
        None => {
            // An unrecognized frame.
            field.values.push(Value::Binary(Box::from(payload)));
            field.has_hidden_data = true;
            Ok(FrameResult::Field(field))
        }
    }
}

/// Demote a field to its raw payload with a warning attached.
fn raw_field(mut field: Field, payload: &[u8], warning: String) -> Field {
    field.values.push(Value::Binary(Box::from(payload)));
    field.has_hidden_data = true;
    field.push_warning(warning);
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    use toccata_core::meta::Value;

    fn ctx(registry: &FormatRegistry) -> DecodeContext<'_> {
        DecodeContext { registry, format: None, lookup: None, language_name: None }
    }

    fn registry() -> FormatRegistry {
        let mut registry = FormatRegistry::new();
        register_frame_decoders(&mut registry);
        registry
    }

    fn parse(version: &VersionInfo, body: &[u8]) -> (Vec<Field>, Vec<String>) {
        let registry = registry();
        let ctx = ctx(&registry);

        let mut fields = Vec::new();
        let mut warnings = Vec::new();
        read_frames(&mut BufReader::new(body), version, &ctx, &mut fields, &mut warnings);

        (fields, warnings)
    }

    #[test]
    fn verify_frame_basics() {
        // One v2.4 text frame.
        let body = b"TIT2\x00\x00\x00\x07\x00\x00\x03Hello\x00";
        let (fields, warnings) = parse(&ID3V2P4, body);

        assert!(warnings.is_empty());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, FieldId(*b"TIT2"));
        assert_eq!(&fields[0].header[0..4], fields[0].id.as_bytes());
        assert_eq!(fields[0].length(), 7);
        assert_eq!(fields[0].values, vec![Value::String("Hello".to_string())]);
    }

    #[test]
    fn verify_padding_terminates() {
        // An empty frame followed by padding.
        let mut body = Vec::new();
        body.extend_from_slice(b"TIT2\x00\x00\x00\x00\x00\x00");
        body.extend_from_slice(&[0x00; 6]);

        let (fields, warnings) = parse(&ID3V2P4, &body);

        assert!(warnings.is_empty());
        // The empty frame is kept; the padding is not a field.
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, FieldId(*b"TIT2"));
        assert!(fields[0].values.is_empty());
        assert!(!fields[0].has_hidden_data);
    }

    #[test]
    fn verify_unknown_frame() {
        let body = b"ZZZZ\x00\x00\x00\x03\x00\x00\x01\x02\x03";
        let (fields, _) = parse(&ID3V2P4, body);

        assert_eq!(fields.len(), 1);
        assert!(fields[0].has_hidden_data);
        assert_eq!(fields[0].values, vec![Value::Binary(Box::from(&[1u8, 2, 3][..]))]);
    }

    #[test]
    fn verify_family_fallbacks() {
        // An unregistered T-frame decodes as text.
        let body = b"TZZZ\x00\x00\x00\x06\x00\x00\x00Hello";
        let (fields, _) = parse(&ID3V2P4, body);
        assert_eq!(fields[0].values, vec![Value::String("Hello".to_string())]);

        // An unregistered W-frame decodes as an URL.
        let body = b"WZZZ\x00\x00\x00\x0b\x00\x00http://a.io";
        let (fields, _) = parse(&ID3V2P4, body);
        assert_eq!(fields[0].values, vec![Value::String("http://a.io".to_string())]);
    }

    #[test]
    fn verify_frame_unsynchronisation() {
        // An unsynchronised v2.4 Latin-1 text frame: the wire payload 'A', 0xff, 0x00 carries
        // one stuffed null that decoding drops, leaving "Aÿ".
        let body = b"TIT2\x00\x00\x00\x04\x00\x02\x00A\xff\x00";
        let (fields, _) = parse(&ID3V2P4, body);

        assert_eq!(fields.len(), 1);
        // The raw wire data is retained in full.
        assert_eq!(fields[0].length(), 4);
        assert_eq!(fields[0].values, vec![Value::String("Aÿ".to_string())]);
    }

    #[test]
    fn verify_malformed_unsynchronisation_keeps_raw() {
        // 0xff followed by 0xe0 is malformed in unsynchronised data.
        let body = b"TIT2\x00\x00\x00\x03\x00\x02\xff\xe0\x00";
        let (fields, _) = parse(&ID3V2P4, body);

        assert_eq!(fields.len(), 1);
        assert!(fields[0].has_hidden_data);
        assert_eq!(fields[0].warnings.len(), 1);
    }

    #[test]
    fn verify_grouped_frame() {
        // A v2.4 grouped frame: group id 0x42 precedes the payload.
        let body = b"TIT2\x00\x00\x00\x08\x00\x40\x42\x00Hello\x00";
        let (fields, _) = parse(&ID3V2P4, body);

        assert_eq!(fields[0].group, Some(0x42));
        assert_eq!(fields[0].values, vec![Value::String("Hello".to_string())]);
    }

    #[test]
    fn verify_encrypted_frame_retained_raw() {
        // A v2.4 encrypted frame: method id 0x01, then opaque data.
        let body = b"TIT2\x00\x00\x00\x04\x00\x04\x01\xaa\xbb\xcc";
        let (fields, _) = parse(&ID3V2P4, body);

        assert_eq!(fields[0].encryption_method, Some(0x01));
        assert!(fields[0].has_hidden_data);
        assert_eq!(fields[0].values, vec![Value::Binary(Box::from(&[0xaa, 0xbb, 0xcc][..]))]);
    }

    #[test]
    fn verify_unknown_flag_bits_warn() {
        // Set an undefined v2.4 flag bit (0x8000).
        let body = b"TIT2\x00\x00\x00\x07\x80\x00\x03Hello\x00";
        let (fields, _) = parse(&ID3V2P4, body);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].warnings.len(), 1);
        assert_eq!(fields[0].values, vec![Value::String("Hello".to_string())]);
    }

    #[test]
    fn verify_truncated_frame_stops_walk() {
        // The declared size extends past the end of the body.
        let body = b"TIT2\x00\x00\x00\x40\x00\x00\x03Hi";
        let (fields, warnings) = parse(&ID3V2P4, body);

        assert!(fields.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn verify_legacy_frames() {
        // An ID3v2.2 title frame: 3 character id, 3 byte size, no flags.
        let body = b"TT2\x00\x00\x06\x00Hello";
        let (fields, warnings) = parse(&ID3V2P2, body);

        assert!(warnings.is_empty());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].id, FieldId(*b"TT2 "));
        assert_eq!(fields[0].values, vec![Value::String("Hello".to_string())]);

        // A legacy counter frame resolves through the modern field table.
        let body = b"CNT\x00\x00\x04\x00\x00\x10\x01";
        let (fields, _) = parse(&ID3V2P2, body);
        assert_eq!(fields[0].values, vec![Value::UnsignedInt(0x1001)]);
    }

    #[test]
    fn verify_v2p3_slash_lists() {
        // TPE1 in v2.3 is a '/'-separated list...
        let body = b"TPE1\x00\x00\x00\x04\x00\x00\x00A/B";
        let (fields, _) = parse(&ID3V2P3, body);
        assert_eq!(
            fields[0].values,
            vec![Value::String("A".to_string()), Value::String("B".to_string())]
        );

        // ...but not in v2.4.
        let body = b"TPE1\x00\x00\x00\x04\x00\x00\x00A/B";
        let (fields, _) = parse(&ID3V2P4, body);
        assert_eq!(fields[0].values, vec![Value::String("A/B".to_string())]);
    }
}
