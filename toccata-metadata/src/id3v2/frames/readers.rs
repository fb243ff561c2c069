// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame body decoders.
//!
//! Each decoder consumes a frame's preprocessed payload and fills in the field's values,
//! subtitle, and name. Decoders are pure functions over an owned buffer; a decoder error
//! demotes the frame to an unknown field upstream, it never fails the tag.

use std::time::Duration;

use lazy_static::lazy_static;
use regex_lite::Regex;

use toccata_core::errors::{decode_error, Result};
use toccata_core::io::{BufReader, FiniteStream, ReadBytes};
use toccata_core::meta::{Field, FieldId, ImageData, Value};
use toccata_core::registry::DecodeContext;

use crate::id3v2::genres::genre_name;
use crate::id3v2::text::{
    decode_text_buf, read_string, read_string_ignore_empty, read_string_list, trim_terminator,
    Encoding,
};
use crate::id3v2::timestamp::parse_timestamp;

// Primitive value readers
//------------------------

/// Read and validate an encoding indicator.
fn read_encoding(reader: &mut BufReader<'_>) -> Result<Encoding> {
    match Encoding::parse(reader.read_byte()?) {
        Some(encoding) => Ok(encoding),
        _ => decode_error("id3v2: invalid text encoding"),
    }
}

/// Read and validate an 8 character unterminated date string in the format "YYYYMMDD".
fn read_date(reader: &mut BufReader<'_>) -> Result<String> {
    let mut date = [0; 8];
    reader.read_buf_exact(&mut date)?;

    // All characters must be digits.
    if date.iter().any(|c| !c.is_ascii_digit()) {
        return decode_error("id3v2: date format is invalid");
    }

    decode_text_buf(&date, Encoding::Iso8859_1)
}

/// Read and validate the remainder of the buffer as a variably sized big-endian counter.
///
/// Counters of any width are accepted. A counter wider than 64 bits is clamped to `u64::MAX`
/// and a warning is attached to the field.
fn read_counter(reader: &mut BufReader<'_>, field: &mut Field) -> Result<Option<u64>> {
    let len = reader.bytes_available() as usize;

    // A length of 0 indicates no counter.
    if len == 0 {
        return Ok(None);
    }

    let buf = reader.read_buf_bytes_ref(len)?;

    // The counter may be extended by an arbitrary amount of leading bytes.
    let significant = match buf.iter().position(|&byte| byte != 0) {
        Some(at) => &buf[at..],
        None => &[],
    };

    if significant.len() > 8 {
        field.push_warning("counter exceeds 64 bits, value clamped");
        return Ok(Some(u64::MAX));
    }

    let mut bytes = [0u8; 8];
    bytes[8 - significant.len()..].copy_from_slice(significant);

    Ok(Some(u64::from_be_bytes(bytes)))
}

/// Resolve the display label for an ISO-639 language code. Codes pass through in lowercase
/// when no language collaborator is present; `XXX` marks an unspecified language.
fn language_label(code: [u8; 3], ctx: &DecodeContext<'_>) -> Option<String> {
    if code.eq_ignore_ascii_case(b"XXX") || !code.iter().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    ctx.language(&code).or_else(|| String::from_utf8(code.to_ascii_lowercase()).ok())
}

fn push_strings(field: &mut Field, items: Vec<String>) {
    field.values.extend(items.into_iter().map(Value::String));
}

// Frame body decoders (keep sorted by family)
//--------------------------------------------

/// Decodes all plain text frames: an encoding indicator followed by one or more
/// null-separated strings.
pub fn read_text_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;
    push_strings(field, read_string_list(&mut reader, encoding)?);
    Ok(())
}

/// Decodes ID3v2.3 text frames whose values are additionally `/`-separated (TPE1, TCOM, TEXT,
/// TOLY, and TOPE).
pub fn read_slash_text_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        field.values.extend(item.split('/').map(|part| Value::String(part.to_string())));
    }

    Ok(())
}

/// Decodes number-of-total frames (TRCK, TPOS).
pub fn read_of_number_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        field.values.push(render_of_number(&item));
    }

    Ok(())
}

fn render_of_number(text: &str) -> Value {
    if let Some((num, total)) = text.split_once('/') {
        if let (Ok(num), Ok(total)) = (num.trim().parse::<u64>(), total.trim().parse::<u64>()) {
            return Value::String(format!("{} of {}", num, total));
        }
    }
    else if let Ok(num) = text.trim().parse::<u64>() {
        return Value::UnsignedInt(num);
    }

    // Non-numeric values pass through.
    Value::String(text.to_string())
}

/// Decodes an ISRC frame (TSRC). Only well-formed 12 character codes are kept; separators are
/// inserted for display.
pub fn read_isrc_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        if item.len() == 12 && !item.contains('-') {
            field.values.push(Value::String(format_isrc(&item)));
        }
    }

    Ok(())
}

fn format_isrc(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + 3);

    for (at, ch) in code.chars().enumerate() {
        if at == 2 || at == 6 || at == 9 {
            out.push('-');
        }
        out.push(ch);
    }

    out
}

/// Decodes a credit list frame (TIPL, TMCL, and legacy IPLS): successive strings pair up as a
/// role followed by the person filling it.
pub fn read_credit_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;
    let items = read_string_list(&mut reader, encoding)?;

    for pair in items.chunks(2) {
        let value = match pair {
            [role, name] if role.is_empty() => format!(": {}", name),
            [role, name] => format!("{}: {}", role, name),
            // A lone, unpaired trailing value.
            [lone] => format!("[{}]", lone),
            _ => unreachable!(),
        };

        field.values.push(Value::String(value));
    }

    Ok(())
}

/// Decodes a millisecond duration frame (TDLY, TLEN).
pub fn read_millis_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        let value = match item.trim().parse::<u64>() {
            Ok(ms) => Value::Duration(Duration::from_millis(ms)),
            Err(_) => Value::String(item),
        };

        field.values.push(value);
    }

    Ok(())
}

lazy_static! {
    // A musical key: a note from A to G, an optional flat or sharp, an optional minor marker.
    static ref KEY_PATTERN: Regex = Regex::new("^[A-G][b#]?m?$").unwrap();
}

/// Decodes an initial musical key frame (TKEY).
pub fn read_key_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        let value = if item == "o" {
            ctx.localize("Field_TKEY_off", "off-key")
        }
        else if KEY_PATTERN.is_match(&item) {
            item.replace('b', "\u{266d}").replace('#', "\u{266f}")
        }
        else {
            format!("[{}]", item)
        };

        field.values.push(Value::String(value));
    }

    Ok(())
}

/// Decodes a language frame (TLAN). Language-code resolution is an external collaborator;
/// codes pass through when it is absent.
pub fn read_language_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        let resolved = match <&[u8; 3]>::try_from(item.as_bytes()) {
            Ok(code) => ctx.language(code),
            Err(_) => None,
        };

        field.values.push(Value::String(resolved.unwrap_or(item)));
    }

    Ok(())
}

lazy_static! {
    // The legacy "(<NUMBER>)" and "(<NUMBER>)<NAME>" genre styles.
    static ref GENRE_PATTERN: Regex = Regex::new(r"^\(([0-9]+)\)(.*)$").unwrap();
}

/// Decodes a content type frame (TCON).
pub fn read_genre_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        let value = render_genre(&item, ctx);
        field.values.push(Value::String(value));
    }

    Ok(())
}

fn render_genre(text: &str, ctx: &DecodeContext<'_>) -> String {
    match text {
        "RX" => return ctx.localize("Field_TCON_RX", "Remix"),
        "CR" => return ctx.localize("Field_TCON_CR", "Cover"),
        _ => (),
    }

    // A numeric genre resolves through the ID3v1 genre table; out-of-range numbers pass
    // through.
    if let Ok(num) = text.parse::<u32>() {
        if num <= 255 {
            if let Some(name) = genre_name(num) {
                return name.to_string();
            }
        }
        return text.to_string();
    }

    // The legacy parenthesized style: "(<NUMBER>)" or "(<NUMBER>)<NAME>". The name, when
    // present, wins.
    if let Some(caps) = GENRE_PATTERN.captures(text) {
        let name = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        if !name.is_empty() {
            return name.to_string();
        }
        if let Some(resolved) =
            caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()).and_then(genre_name)
        {
            return resolved.to_string();
        }
    }

    text.to_string()
}

/// Decodes frames whose codes resolve through the localization table (TFLT, TMED, TCMP).
pub fn read_keyed_lookup_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        let key = format!("Field_{}_{}", field.id, item.replace(['/', '.'], "_"));
        let value = ctx.lookup(&key).unwrap_or_else(|| format!("[{}]", item));
        field.values.push(Value::String(value));
    }

    Ok(())
}

/// Decodes a copyright (TCOP) or production copyright (TPRO) frame, prefixing the © or ℗
/// mark.
pub fn read_copyright_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    let mark = if field.id == FieldId(*b"TPRO") { '\u{2117}' } else { '\u{a9}' };

    for item in read_string_list(&mut reader, encoding)? {
        field.values.push(Value::String(format!("{} {}", mark, item)));
    }

    Ok(())
}

/// Decodes a timestamp frame (TDEN, TDOR, TDRC, TDRL, TDTG).
pub fn read_timestamp_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    for item in read_string_list(&mut reader, encoding)? {
        let value = match parse_timestamp(&item) {
            Some(ts) => Value::Timestamp(ts),
            None => Value::String(ctx.localize("Value_Timestamp_Unknown", "Unknown")),
        };

        field.values.push(value);
    }

    Ok(())
}

/// Decodes a user defined text frame (TXXX): the description becomes the field subtitle.
pub fn read_user_text_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    field.subtitle = Some(read_string(&mut reader, encoding)?);
    push_strings(field, read_string_list(&mut reader, encoding)?);

    Ok(())
}

/// Decodes all URL frames except WXXX. URL frames carry no encoding indicator; the URL is
/// always ISO-8859-1.
pub fn read_url_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let url = read_string(&mut reader, Encoding::Iso8859_1)?;
    field.values.push(Value::String(url));
    Ok(())
}

/// Decodes a user defined URL frame (WXXX): an encoded description followed by an ISO-8859-1
/// URL.
pub fn read_user_url_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    field.subtitle = read_string_ignore_empty(&mut reader, encoding)?;

    let url = read_string(&mut reader, Encoding::Iso8859_1)?;
    field.values.push(Value::String(url));

    Ok(())
}

/// Decodes a long text frame (COMM, USLT): an encoded description and language, then a text
/// body that is not null-separated.
pub fn read_long_text_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    // Three ISO-8859-1 language code bytes.
    let lang = reader.read_triple_bytes()?;

    // Optional content description.
    let desc = read_string_ignore_empty(&mut reader, encoding)?;

    // The remainder is the text body, decoded wholesale.
    let body = reader.read_buf_bytes_available_ref();
    let text = decode_text_buf(trim_terminator(body, encoding), encoding)?;

    field.subtitle = desc.or_else(|| language_label(lang, ctx));
    field.values.push(Value::String(text));

    Ok(())
}

/// The attached picture category table.
fn picture_category_name(category: u8) -> Option<&'static str> {
    match category {
        0x00 => Some("Other"),
        0x01 => Some("File icon"),
        0x02 => Some("Other file icon"),
        0x03 => Some("Front cover"),
        0x04 => Some("Back cover"),
        0x05 => Some("Leaflet page"),
        0x06 => Some("Media"),
        0x07 => Some("Lead artist"),
        0x08 => Some("Artist"),
        0x09 => Some("Conductor"),
        0x0a => Some("Band"),
        0x0b => Some("Composer"),
        0x0c => Some("Lyricist"),
        0x0d => Some("Recording location"),
        0x0e => Some("During recording"),
        0x0f => Some("During performance"),
        0x10 => Some("Screen capture"),
        0x11 => Some("A bright coloured fish"),
        0x12 => Some("Illustration"),
        0x13 => Some("Band logotype"),
        0x14 => Some("Publisher logotype"),
        _ => None,
    }
}

/// Decodes an attached picture frame (APIC, and the legacy 3 character PIC variant).
///
/// The category becomes the field's human name and the description its subtitle.
pub fn read_image_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    // Legacy PIC frames use a 3 character image format instead of a media-type string.
    let media_type = if field.header.len() < 10 {
        match &reader.read_triple_bytes()? {
            b"JPG" => "image/jpeg".to_string(),
            b"PNG" => "image/png".to_string(),
            b"BMP" => "image/bmp".to_string(),
            b"GIF" => "image/gif".to_string(),
            other => decode_text_buf(other, Encoding::Iso8859_1)?,
        }
    }
    else {
        read_string(&mut reader, Encoding::Iso8859_1)?
    };

    // Image category.
    let category = reader.read_u8()?;

    // Null-terminated image description in the indicated encoding.
    let desc = read_string_ignore_empty(&mut reader, encoding)?;

    // The remainder of the frame is the image data.
    let data = reader.read_buf_bytes_available_ref();

    field.name = Some(match picture_category_name(category) {
        Some(name) => ctx.localize(&format!("Field_APIC_{}", category), name),
        None => format!("[{}]", category),
    });
    field.subtitle = desc;
    field.values.push(Value::Image(ImageData { media_type, data: Box::from(data) }));

    Ok(())
}

/// Decodes a unique file identifier frame (UFID): the owner becomes the field subtitle, the
/// binary identifier its value.
pub fn read_ufid_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let owner = read_string(&mut reader, Encoding::Iso8859_1)?;
    let id = reader.read_buf_bytes_available_ref();

    // 64 bytes is the limit of the identifier per the specification, but real-world tags
    // overshoot it.
    if id.len() > 64 {
        field.push_warning("identifier exceeds 64 bytes");
    }

    field.subtitle = Some(owner);
    field.values.push(Value::Binary(Box::from(id)));

    Ok(())
}

/// Decodes a play counter frame (PCNT).
pub fn read_pcnt_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    if let Some(count) = read_counter(&mut reader, field)? {
        field.values.push(Value::UnsignedInt(count));
    }

    Ok(())
}

/// Decodes a popularimeter frame (POPM): a rating and an optional play counter, attributed to
/// a user email in the subtitle.
pub fn read_popm_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let email = read_string(&mut reader, Encoding::Iso8859_1)?;
    let rating = reader.read_u8()?;

    field.subtitle = Some(email).filter(|email| !email.is_empty());
    field.values.push(Value::UnsignedInt(u64::from(rating)));

    if let Some(count) = read_counter(&mut reader, field)? {
        field.values.push(Value::UnsignedInt(count));
    }

    Ok(())
}

/// Decodes a private frame (PRIV): the owner becomes the field subtitle, the payload its
/// value.
pub fn read_priv_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let owner = read_string(&mut reader, Encoding::Iso8859_1)?;
    let data = reader.read_buf_bytes_available_ref();

    field.subtitle = Some(owner).filter(|owner| !owner.is_empty());
    field.values.push(Value::Binary(Box::from(data)));

    Ok(())
}

/// Decodes a music CD identifier frame (MCDI): a binary dump of a CD-DA TOC.
pub fn read_mcdi_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let data = reader.read_buf_bytes_available_ref();
    field.values.push(Value::Binary(Box::from(data)));
    Ok(())
}

/// Decodes a general encapsulated object frame (GEOB).
pub fn read_geob_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    // The media-type. This is mandatory.
    let media_type = read_string(&mut reader, Encoding::Iso8859_1)?;
    // Optional filename.
    let file_name = read_string_ignore_empty(&mut reader, encoding)?;
    // Optional content description.
    let desc = read_string_ignore_empty(&mut reader, encoding)?;
    // The object data.
    let object = reader.read_buf_bytes_available_ref();

    field.subtitle = desc.or(file_name);

    if !media_type.is_empty() {
        field.values.push(Value::String(media_type));
    }
    field.values.push(Value::Binary(Box::from(object)));

    Ok(())
}

/// Decodes the body of a frame into a single raw binary value. Used for frames whose payloads
/// have no further structure worth modelling (synchronised lyrics, volume adjustments, event
/// timing codes, and the like).
pub fn read_raw_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let data = reader.read_buf_bytes_available_ref();
    field.values.push(Value::Binary(Box::from(data)));
    Ok(())
}

/// Decodes an audio encryption frame (AENC).
pub fn read_aenc_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    // The owner identifier string.
    let owner = read_string(&mut reader, Encoding::Iso8859_1)?;
    // Unencrypted, "preview", audio start position and length in frames.
    let preview_start = reader.read_be_u16()?;
    let preview_length = reader.read_be_u16()?;
    // The remainder of the frame is the binary encryption information.
    let info = reader.read_buf_bytes_available_ref();

    field.subtitle = Some(owner).filter(|owner| !owner.is_empty());
    field.values.push(Value::UnsignedInt(u64::from(preview_start)));
    field.values.push(Value::UnsignedInt(u64::from(preview_length)));
    field.values.push(Value::Binary(Box::from(info)));

    Ok(())
}

/// Decodes a commercial frame (COMR).
pub fn read_comr_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    // The price in the format: "<CURRENCY CODE 1><PRICE 1>[[/<CURRENCY CODE 2><PRICE 2>] ...]".
    let price = read_string(&mut reader, Encoding::Iso8859_1)?;
    // Price valid through this date.
    let valid_until = read_date(&mut reader)?;
    // Seller contact information (email address, URL, etc.).
    let contact = read_string(&mut reader, Encoding::Iso8859_1)?;
    // How the audio was delivered (a CD, a file, a stream, note sheets, ...).
    let received_as = reader.read_u8()?;
    // The seller name, then a description of the product.
    let seller = read_string(&mut reader, encoding)?;
    let desc = read_string_ignore_empty(&mut reader, encoding)?;
    // Optional media-type and picture data for the seller logo.
    let logo_type = read_string_ignore_empty(&mut reader, Encoding::Iso8859_1)?;
    let logo = reader.read_buf_bytes_available_ref();

    field.subtitle = desc;
    field.values.push(Value::String(price));
    field.values.push(Value::String(valid_until));

    if !contact.is_empty() {
        field.values.push(Value::String(contact));
    }

    field.values.push(Value::UnsignedInt(u64::from(received_as)));

    if !seller.is_empty() {
        field.values.push(Value::String(seller));
    }

    if !logo.is_empty() {
        field.values.push(Value::Image(ImageData {
            media_type: logo_type.unwrap_or_default(),
            data: Box::from(logo),
        }));
    }

    Ok(())
}

/// Decodes an encryption method registration frame (ENCR).
pub fn read_encr_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    // The owner identifier string.
    let owner = read_string(&mut reader, Encoding::Iso8859_1)?;
    // The encryption method symbol.
    let method = reader.read_u8()?;
    // The remainder of the frame is encryption method data.
    let data = reader.read_buf_bytes_available_ref();

    field.subtitle = Some(owner).filter(|owner| !owner.is_empty());
    field.values.push(Value::UnsignedInt(u64::from(method)));
    field.values.push(Value::Binary(Box::from(data)));

    Ok(())
}

/// Decodes a group identification registration frame (GRID).
pub fn read_grid_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    // The owner identifier string.
    let owner = read_string(&mut reader, Encoding::Iso8859_1)?;
    // The group symbol being registered.
    let group = reader.read_u8()?;
    // The remainder of the frame is group dependent data.
    let data = reader.read_buf_bytes_available_ref();

    field.subtitle = Some(owner).filter(|owner| !owner.is_empty());
    field.values.push(Value::UnsignedInt(u64::from(group)));
    field.values.push(Value::Binary(Box::from(data)));

    Ok(())
}

/// Decodes an ownership frame (OWNE).
pub fn read_owne_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    // The price paid in the format: "<CURRENCY CODE><PRICE>".
    let price = read_string(&mut reader, Encoding::Iso8859_1)?;
    // The date of purchase.
    let purchased = read_date(&mut reader)?;
    // The name of the seller.
    let seller = read_string(&mut reader, encoding)?;

    field.values.push(Value::String(price));
    field.values.push(Value::String(purchased));

    if !seller.is_empty() {
        field.values.push(Value::String(seller));
    }

    Ok(())
}

/// Decodes a position synchronisation frame (POSS).
pub fn read_poss_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    // The units used for the position.
    let units = reader.read_u8()?;
    // The position.
    let position = reader.read_be_u32()?;

    field.subtitle = match units {
        1 => Some("MPEG frames".to_string()),
        2 => Some("milliseconds".to_string()),
        _ => None,
    };
    field.values.push(Value::UnsignedInt(u64::from(position)));

    Ok(())
}

/// Decodes a signature frame (SIGN).
pub fn read_sign_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    _ctx: &DecodeContext<'_>,
) -> Result<()> {
    // The group this signature belongs to.
    field.group = Some(reader.read_u8()?);
    // The remainder of the frame is the signature data.
    let signature = reader.read_buf_bytes_available_ref();
    field.values.push(Value::Binary(Box::from(signature)));

    Ok(())
}

/// Decodes a terms of use frame (USER).
pub fn read_user_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    let encoding = read_encoding(&mut reader)?;

    // Three ISO-8859-1 language code bytes.
    let lang = reader.read_triple_bytes()?;

    // The terms of use.
    let terms = read_string(&mut reader, encoding)?;

    field.subtitle = language_label(lang, ctx);
    field.values.push(Value::String(terms));

    Ok(())
}

/// Decodes a chapter frame (CHAP).
///
/// The element identifier becomes the subtitle; the start and end times become duration
/// values. The values of any embedded sub-frames (typically the chapter title) are folded
/// into this field.
pub fn read_chap_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    // The chapter element identifier.
    let element_id = read_string(&mut reader, Encoding::Iso8859_1)?;

    // Start and end times in milliseconds.
    let start_ms = reader.read_be_u32()?;
    let end_ms = reader.read_be_u32()?;

    // Optional start and end byte offsets. A value of all ones means the offset is unused.
    let _start_byte = reader.read_be_u32()?;
    let _end_byte = reader.read_be_u32()?;

    field.subtitle = Some(element_id);
    field.values.push(Value::Duration(Duration::from_millis(u64::from(start_ms))));
    field.values.push(Value::Duration(Duration::from_millis(u64::from(end_ms))));

    read_embedded_frames(&mut reader, field, ctx);

    Ok(())
}

/// Decodes a table of contents frame (CTOC).
pub fn read_ctoc_frame(
    mut reader: BufReader<'_>,
    field: &mut Field,
    ctx: &DecodeContext<'_>,
) -> Result<()> {
    // The table of contents element identifier.
    let element_id = read_string(&mut reader, Encoding::Iso8859_1)?;

    // Flags: bit 0 orders the entries, bit 1 marks the top-level table of contents.
    let _flags = reader.read_u8()?;

    // The child element identifiers.
    let entry_count = reader.read_u8()?;

    field.subtitle = Some(element_id);

    for _ in 0..entry_count {
        let child = read_string(&mut reader, Encoding::Iso8859_1)?;
        field.values.push(Value::String(child));
    }

    read_embedded_frames(&mut reader, field, ctx);

    Ok(())
}

/// Fold the values of frames embedded in a CHAP or CTOC frame into the parent field.
fn read_embedded_frames(reader: &mut BufReader<'_>, field: &mut Field, ctx: &DecodeContext<'_>) {
    use super::{read_frames, version_by_format};

    let version = match ctx.format.and_then(version_by_format) {
        Some(version) => version,
        None => return,
    };

    let rest = reader.read_buf_bytes_available_ref();

    let mut sub_fields = Vec::new();
    let mut warnings = Vec::new();

    read_frames(&mut BufReader::new(rest), version, ctx, &mut sub_fields, &mut warnings);

    for sub in sub_fields {
        field.values.extend(sub.values);
    }

    for warning in warnings {
        field.push_warning(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use toccata_core::registry::{FieldDecoderFn, FormatRegistry};

    fn new_field(id: &[u8; 4]) -> Field {
        let mut header = id.to_vec();
        header.resize(10, 0);
        Field::new(header.into_boxed_slice(), Box::from(&[][..]), FieldId(*id))
    }

    fn decode(decoder: FieldDecoderFn, id: &[u8; 4], payload: &[u8]) -> Field {
        let registry = FormatRegistry::new();
        let ctx =
            DecodeContext { registry: &registry, format: None, lookup: None, language_name: None };

        let mut field = new_field(id);
        decoder(BufReader::new(payload), &mut field, &ctx).unwrap();
        field
    }

    fn texts(field: &Field) -> Vec<&str> {
        field
            .values
            .iter()
            .map(|value| match value {
                Value::String(text) => text.as_str(),
                _ => panic!("not a text value"),
            })
            .collect()
    }

    #[test]
    fn verify_read_encoding() {
        assert!(read_encoding(&mut BufReader::new(&[])).is_err());
        assert_eq!(read_encoding(&mut BufReader::new(&[0])).unwrap(), Encoding::Iso8859_1);
        assert_eq!(read_encoding(&mut BufReader::new(&[1])).unwrap(), Encoding::Utf16Bom);
        assert_eq!(read_encoding(&mut BufReader::new(&[2])).unwrap(), Encoding::Utf16Be);
        assert_eq!(read_encoding(&mut BufReader::new(&[3])).unwrap(), Encoding::Utf8);
        assert!(read_encoding(&mut BufReader::new(&[4])).is_err());
    }

    #[test]
    fn verify_read_text_frame() {
        let field = decode(read_text_frame, b"TIT2", b"\x03Hello\0");
        assert_eq!(texts(&field), &["Hello"]);

        let field = decode(read_text_frame, b"TPE1", b"\x00One\0Two");
        assert_eq!(texts(&field), &["One", "Two"]);
    }

    #[test]
    fn verify_read_slash_text_frame() {
        let field = decode(read_slash_text_frame, b"TPE1", b"\x00A/B");
        assert_eq!(texts(&field), &["A", "B"]);

        let field = decode(read_slash_text_frame, b"TPE1", b"\x00AC/DC\0Other");
        assert_eq!(texts(&field), &["AC", "DC", "Other"]);
    }

    #[test]
    fn verify_read_of_number_frame() {
        // "5/12" renders as "5 of 12".
        let field = decode(read_of_number_frame, b"TRCK", b"\x005/12");
        assert_eq!(texts(&field), &["5 of 12"]);

        // A lone number is an integer.
        let field = decode(read_of_number_frame, b"TRCK", b"\x005");
        assert_eq!(field.values, vec![Value::UnsignedInt(5)]);

        // Non-numeric values pass through.
        let field = decode(read_of_number_frame, b"TRCK", b"\x00X");
        assert_eq!(texts(&field), &["X"]);
        let field = decode(read_of_number_frame, b"TRCK", b"\x005/X");
        assert_eq!(texts(&field), &["5/X"]);
    }

    #[test]
    fn verify_read_isrc_frame() {
        let field = decode(read_isrc_frame, b"TSRC", b"\x00USRC17607839");
        assert_eq!(texts(&field), &["US-RC17-607-839"]);

        // Malformed codes are dropped.
        let field = decode(read_isrc_frame, b"TSRC", b"\x00US-RC17-607-839");
        assert!(field.values.is_empty());
        let field = decode(read_isrc_frame, b"TSRC", b"\x00TOOSHORT");
        assert!(field.values.is_empty());
    }

    #[test]
    fn verify_read_credit_frame() {
        let field = decode(read_credit_frame, b"TIPL", b"\x00producer\0P. Name\0mix\0M. Name");
        assert_eq!(texts(&field), &["producer: P. Name", "mix: M. Name"]);

        // An empty role.
        let field = decode(read_credit_frame, b"TIPL", b"\x00\0Somebody");
        assert_eq!(texts(&field), &[": Somebody"]);

        // An unpaired trailing value is bracketed.
        let field = decode(read_credit_frame, b"TMCL", b"\x00violin\0V. Name\0cello");
        assert_eq!(texts(&field), &["violin: V. Name", "[cello]"]);
    }

    #[test]
    fn verify_read_millis_frame() {
        let field = decode(read_millis_frame, b"TLEN", b"\x001500");
        assert_eq!(field.values, vec![Value::Duration(Duration::from_millis(1500))]);

        let field = decode(read_millis_frame, b"TDLY", b"\x00soon");
        assert_eq!(texts(&field), &["soon"]);
    }

    #[test]
    fn verify_read_key_frame() {
        let field = decode(read_key_frame, b"TKEY", b"\x00Cbm");
        assert_eq!(texts(&field), &["C\u{266d}m"]);

        let field = decode(read_key_frame, b"TKEY", b"\x00F#");
        assert_eq!(texts(&field), &["F\u{266f}"]);

        let field = decode(read_key_frame, b"TKEY", b"\x00o");
        assert_eq!(texts(&field), &["off-key"]);

        // Anything else is bracketed.
        let field = decode(read_key_frame, b"TKEY", b"\x00H major");
        assert_eq!(texts(&field), &["[H major]"]);
    }

    #[test]
    fn verify_read_genre_frame() {
        let field = decode(read_genre_frame, b"TCON", b"\x0017");
        assert_eq!(texts(&field), &["Rock"]);

        let field = decode(read_genre_frame, b"TCON", b"\x00RX");
        assert_eq!(texts(&field), &["Remix"]);

        let field = decode(read_genre_frame, b"TCON", b"\x00CR");
        assert_eq!(texts(&field), &["Cover"]);

        let field = decode(read_genre_frame, b"TCON", b"\x00255");
        assert_eq!(texts(&field), &["None"]);

        // Out-of-table numbers and free-form names pass through.
        let field = decode(read_genre_frame, b"TCON", b"\x00200");
        assert_eq!(texts(&field), &["200"]);
        let field = decode(read_genre_frame, b"TCON", b"\x00Post-Bop");
        assert_eq!(texts(&field), &["Post-Bop"]);

        // Legacy parenthesized styles.
        let field = decode(read_genre_frame, b"TCON", b"\x00(17)");
        assert_eq!(texts(&field), &["Rock"]);
        let field = decode(read_genre_frame, b"TCON", b"\x00(17)Stoner Rock");
        assert_eq!(texts(&field), &["Stoner Rock"]);
    }

    #[test]
    fn verify_read_keyed_lookup_frame() {
        // Without a lookup collaborator the code is bracketed.
        let field = decode(read_keyed_lookup_frame, b"TFLT", b"\x00MPG/3");
        assert_eq!(texts(&field), &["[MPG/3]"]);

        // With a lookup collaborator the key resolves.
        fn lookup(key: &str) -> Option<String> {
            match key {
                "Field_TFLT_MPG_3" => Some("MPEG 1/2 layer III".to_string()),
                _ => None,
            }
        }

        let registry = FormatRegistry::new();
        let ctx = DecodeContext {
            registry: &registry,
            format: None,
            lookup: Some(lookup),
            language_name: None,
        };

        let mut field = new_field(b"TFLT");
        read_keyed_lookup_frame(BufReader::new(b"\x00MPG/3"), &mut field, &ctx).unwrap();
        assert_eq!(texts(&field), &["MPEG 1/2 layer III"]);
    }

    #[test]
    fn verify_read_copyright_frame() {
        let field = decode(read_copyright_frame, b"TCOP", b"\x002004 Label");
        assert_eq!(texts(&field), &["\u{a9} 2004 Label"]);

        let field = decode(read_copyright_frame, b"TPRO", b"\x002004 Label");
        assert_eq!(texts(&field), &["\u{2117} 2004 Label"]);
    }

    #[test]
    fn verify_read_timestamp_frame() {
        let field = decode(read_timestamp_frame, b"TDRC", b"\x002004-06-13T14:30:00");
        match &field.values[0] {
            Value::Timestamp(ts) => {
                assert_eq!(ts.start.to_string(), "2004-06-13 14:30:00");
                assert_eq!(ts.end, None);
            }
            _ => panic!("expected a timestamp"),
        }

        // Unparseable timestamps render as "Unknown".
        let field = decode(read_timestamp_frame, b"TDRC", b"\x00whenever");
        assert_eq!(texts(&field), &["Unknown"]);
    }

    #[test]
    fn verify_read_user_text_frame() {
        let field = decode(read_user_text_frame, b"TXXX", b"\x00replaygain\x001.0 dB");
        assert_eq!(field.subtitle.as_deref(), Some("replaygain"));
        assert_eq!(texts(&field), &["1.0 dB"]);

        // Multiple values.
        let field = decode(read_user_text_frame, b"TXXX", b"\x00desc\x00a\x00b");
        assert_eq!(field.subtitle.as_deref(), Some("desc"));
        assert_eq!(texts(&field), &["a", "b"]);
    }

    #[test]
    fn verify_read_url_frame() {
        let field = decode(read_url_frame, b"WOAR", b"https://example.com/artist");
        assert_eq!(texts(&field), &["https://example.com/artist"]);
    }

    #[test]
    fn verify_read_user_url_frame() {
        let field = decode(read_user_url_frame, b"WXXX", b"\x00homepage\x00https://example.com");
        assert_eq!(field.subtitle.as_deref(), Some("homepage"));
        assert_eq!(texts(&field), &["https://example.com"]);
    }

    #[test]
    fn verify_read_long_text_frame() {
        let field = decode(read_long_text_frame, b"COMM", b"\x00engdescription\x00The comment.");
        assert_eq!(field.subtitle.as_deref(), Some("description"));
        assert_eq!(texts(&field), &["The comment."]);

        // An empty description falls back to the language code.
        let field = decode(read_long_text_frame, b"USLT", b"\x00eng\x00Line one\nLine two");
        assert_eq!(field.subtitle.as_deref(), Some("eng"));
        assert_eq!(texts(&field), &["Line one\nLine two"]);
    }

    #[test]
    fn verify_read_image_frame() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"\x00image/png\x00\x03cover art\x00");
        payload.extend_from_slice(&[0x89, 0x50, 0x4e, 0x47]);

        let field = decode(read_image_frame, b"APIC", &payload);

        assert_eq!(field.name.as_deref(), Some("Front cover"));
        assert_eq!(field.subtitle.as_deref(), Some("cover art"));
        match &field.values[0] {
            Value::Image(image) => {
                assert_eq!(image.media_type, "image/png");
                assert_eq!(image.data.as_ref(), &[0x89, 0x50, 0x4e, 0x47]);
            }
            _ => panic!("expected an image"),
        }
    }

    #[test]
    fn verify_read_ufid_frame() {
        let field = decode(read_ufid_frame, b"UFID", b"http://owner\x00\x01\x02\x03");
        assert_eq!(field.subtitle.as_deref(), Some("http://owner"));
        assert_eq!(field.values, vec![Value::Binary(Box::from(&[1u8, 2, 3][..]))]);
    }

    #[test]
    fn verify_read_pcnt_frame() {
        let field = decode(read_pcnt_frame, b"PCNT", &[0x00, 0x00, 0x10, 0x01]);
        assert_eq!(field.values, vec![Value::UnsignedInt(0x1001)]);
        assert!(field.warnings.is_empty());

        // A single byte counter is accepted.
        let field = decode(read_pcnt_frame, b"PCNT", &[0x07]);
        assert_eq!(field.values, vec![Value::UnsignedInt(7)]);

        // A wide counter with only leading zeros still fits.
        let mut payload = vec![0x00; 8];
        payload.extend_from_slice(&u64::MAX.to_be_bytes());
        let field = decode(read_pcnt_frame, b"PCNT", &payload);
        assert_eq!(field.values, vec![Value::UnsignedInt(u64::MAX)]);
        assert!(field.warnings.is_empty());

        // A counter exceeding 64 bits is clamped with a warning.
        let field = decode(read_pcnt_frame, b"PCNT", &[0xff; 16]);
        assert_eq!(field.values, vec![Value::UnsignedInt(u64::MAX)]);
        assert_eq!(field.warnings.len(), 1);
    }

    #[test]
    fn verify_read_popm_frame() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"user@example.com\x00");
        payload.push(196);
        payload.extend_from_slice(&[0x00, 0x00, 0x00, 0x2a]);

        let field = decode(read_popm_frame, b"POPM", &payload);

        assert_eq!(field.subtitle.as_deref(), Some("user@example.com"));
        assert_eq!(field.values, vec![Value::UnsignedInt(196), Value::UnsignedInt(42)]);
    }

    #[test]
    fn verify_read_date() {
        assert!(read_date(&mut BufReader::new(&[])).is_err());
        assert!(read_date(&mut BufReader::new(b"0123456")).is_err());
        assert!(read_date(&mut BufReader::new(b"0123456a")).is_err());
        assert_eq!(read_date(&mut BufReader::new(b"20000101")).unwrap(), "20000101");
        // Read only 8 digits.
        assert_eq!(read_date(&mut BufReader::new(b"0123456789abcdef")).unwrap(), "01234567");
    }

    #[test]
    fn verify_read_aenc_frame() {
        let field =
            decode(read_aenc_frame, b"AENC", b"owner\x00\x00\x10\x00\x20\xaa\xbb");
        assert_eq!(field.subtitle.as_deref(), Some("owner"));
        assert_eq!(
            field.values,
            vec![
                Value::UnsignedInt(0x10),
                Value::UnsignedInt(0x20),
                Value::Binary(Box::from(&[0xaa, 0xbb][..]))
            ]
        );
    }

    #[test]
    fn verify_read_comr_frame() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"\x00usd10.00\x0020300101");
        payload.extend_from_slice(b"store@example.com\x00");
        payload.push(0x03); // delivered as a file over the internet
        payload.extend_from_slice(b"Seller\x00Album download\x00");

        let field = decode(read_comr_frame, b"COMR", &payload);

        assert_eq!(field.subtitle.as_deref(), Some("Album download"));
        assert_eq!(
            field.values,
            vec![
                Value::String("usd10.00".to_string()),
                Value::String("20300101".to_string()),
                Value::String("store@example.com".to_string()),
                Value::UnsignedInt(3),
                Value::String("Seller".to_string()),
            ]
        );
    }

    #[test]
    fn verify_read_encr_and_grid_frames() {
        let field = decode(read_encr_frame, b"ENCR", b"com.example\x00\x81\x01\x02");
        assert_eq!(field.subtitle.as_deref(), Some("com.example"));
        assert_eq!(
            field.values,
            vec![Value::UnsignedInt(0x81), Value::Binary(Box::from(&[0x01, 0x02][..]))]
        );

        let field = decode(read_grid_frame, b"GRID", b"com.example\x00\x42");
        assert_eq!(
            field.values,
            vec![Value::UnsignedInt(0x42), Value::Binary(Box::from(&[][..]))]
        );
    }

    #[test]
    fn verify_read_owne_frame() {
        let field = decode(read_owne_frame, b"OWNE", b"\x00usd5.00\x0020200229Shop");
        assert_eq!(
            field.values,
            vec![
                Value::String("usd5.00".to_string()),
                Value::String("20200229".to_string()),
                Value::String("Shop".to_string()),
            ]
        );
    }

    #[test]
    fn verify_read_poss_frame() {
        let field = decode(read_poss_frame, b"POSS", &[0x02, 0x00, 0x00, 0x30, 0x39]);
        assert_eq!(field.subtitle.as_deref(), Some("milliseconds"));
        assert_eq!(field.values, vec![Value::UnsignedInt(12345)]);
    }

    #[test]
    fn verify_read_sign_frame() {
        let field = decode(read_sign_frame, b"SIGN", &[0x42, 0xde, 0xad]);
        assert_eq!(field.group, Some(0x42));
        assert_eq!(field.values, vec![Value::Binary(Box::from(&[0xde, 0xad][..]))]);
    }

    #[test]
    fn verify_read_user_frame() {
        let field = decode(read_user_frame, b"USER", b"\x00engAll rights reserved.");
        assert_eq!(field.subtitle.as_deref(), Some("eng"));
        assert_eq!(field.values, vec![Value::String("All rights reserved.".to_string())]);
    }

    #[test]
    fn verify_read_chap_frame() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"chp0\x00");
        payload.extend_from_slice(&1000u32.to_be_bytes());
        payload.extend_from_slice(&2000u32.to_be_bytes());
        payload.extend_from_slice(&[0xff; 8]); // unused byte offsets
        // An embedded TIT2 sub-frame carrying the chapter title.
        payload.extend_from_slice(b"TIT2\x00\x00\x00\x06\x00\x00\x03Intro");

        let registry = {
            let mut registry = FormatRegistry::new();
            super::super::register_frame_decoders(&mut registry);
            registry
        };
        let ctx = DecodeContext {
            registry: &registry,
            format: Some("ID3v2.4"),
            lookup: None,
            language_name: None,
        };

        let mut field = new_field(b"CHAP");
        read_chap_frame(BufReader::new(&payload), &mut field, &ctx).unwrap();

        assert_eq!(field.subtitle.as_deref(), Some("chp0"));
        assert_eq!(
            field.values,
            vec![
                Value::Duration(Duration::from_millis(1000)),
                Value::Duration(Duration::from_millis(2000)),
                Value::String("Intro".to_string()),
            ]
        );
    }

    #[test]
    fn verify_read_ctoc_frame() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"toc\x00");
        payload.push(0x03); // top-level, ordered
        payload.push(2);
        payload.extend_from_slice(b"chp0\x00chp1\x00");

        // Without a format in the context, embedded frames are simply skipped.
        let field = decode(read_ctoc_frame, b"CTOC", &payload);

        assert_eq!(field.subtitle.as_deref(), Some("toc"));
        assert_eq!(
            field.values,
            vec![Value::String("chp0".to_string()), Value::String("chp1".to_string())]
        );
    }

    #[test]
    fn verify_read_priv_frame() {
        let field = decode(read_priv_frame, b"PRIV", b"com.example\x00\xde\xad");
        assert_eq!(field.subtitle.as_deref(), Some("com.example"));
        assert_eq!(field.values, vec![Value::Binary(Box::from(&[0xde, 0xad][..]))]);
    }

    #[test]
    fn verify_read_geob_frame() {
        let field =
            decode(read_geob_frame, b"GEOB", b"\x00text/plain\x00notes.txt\x00notes\x00abc");
        assert_eq!(field.subtitle.as_deref(), Some("notes"));
        assert_eq!(
            field.values,
            vec![
                Value::String("text/plain".to_string()),
                Value::Binary(Box::from(&b"abc"[..]))
            ]
        );
    }
}
