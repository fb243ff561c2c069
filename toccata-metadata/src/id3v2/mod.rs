// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An ID3v2 metadata tag parser.
//!
//! ID3v2.2 through ID3v2.4 tags are supported. Each major version registers as its own format
//! (`"ID3v2.2"`, `"ID3v2.3"`, `"ID3v2.4"`) sharing one container parser parameterized by a
//! version descriptor.

use crc::{Crc, CRC_32_ISO_HDLC};
use log::{trace, warn};

use toccata_core::errors::{decode_error, Result};
use toccata_core::io::{BufReader, ReadBytes};
use toccata_core::meta::Container;
use toccata_core::registry::{
    ContainerReader, DecodeContext, FormatRegistry, RegisterableFormat,
};
use toccata_core::util::bits::parse_unsigned_be;

mod frames;
mod genres;
mod text;
mod timestamp;
mod unsync;

use frames::{VersionInfo, ID3V2P2, ID3V2P3, ID3V2P4};
use unsync::read_syncsafe_leq32;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// The length in bytes of an ID3v2 tag header.
const TAG_HEADER_LEN: usize = 10;

#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
enum TagSizeRestriction {
    Max128Frames1024KiB,
    Max64Frames128KiB,
    Max32Frames40KiB,
    Max32Frames4KiB,
}

#[derive(Debug)]
enum TextEncodingRestriction {
    None,
    Utf8OrIso88591,
}

#[derive(Debug)]
enum TextFieldSize {
    None,
    Max1024Characters,
    Max128Characters,
    Max30Characters,
}

#[derive(Debug)]
enum ImageEncodingRestriction {
    None,
    PngOrJpegOnly,
}

#[derive(Debug)]
enum ImageSizeRestriction {
    None,
    LessThan256x256,
    LessThan64x64,
    Exactly64x64,
}

/// The parsed 10 byte header of an ID3v2 tag.
#[derive(Copy, Clone, Debug)]
struct TagHeader {
    major_version: u8,
    minor_version: u8,
    size: u32,
    flags: u8,
    unsynchronisation: bool,
    has_extended_header: bool,
    experimental: bool,
    has_footer: bool,
    /// ID3v2.2 only. A compressed tag cannot be read further and is kept as a stub.
    compressed: bool,
    /// Set flag bits with no meaning in the tag's version.
    unknown_flags: u8,
}

/// Parse and validate the header of an ID3v2 tag. Returns `None` when the prefix is not an
/// ID3v2 tag this parser accepts.
fn parse_tag_header(prefix: &[u8]) -> Option<TagHeader> {
    if prefix.len() < TAG_HEADER_LEN || &prefix[0..3] != b"ID3" {
        return None;
    }

    let major_version = prefix[3];
    let minor_version = prefix[4];

    // Version numbers of 0xff can never occur.
    if major_version == 0xff || minor_version == 0xff {
        return None;
    }

    if major_version < 2 || major_version > 4 {
        return None;
    }

    // Each length byte carries 7 significant bits; a set high bit rejects the header.
    if prefix[6..10].iter().any(|&byte| byte & 0x80 != 0) {
        return None;
    }

    let flags = prefix[5];
    let size = parse_unsigned_be(&prefix[6..10], 7).ok()?;

    let mut header = TagHeader {
        major_version,
        minor_version,
        size,
        flags,
        unsynchronisation: flags & 0x80 != 0,
        has_extended_header: false,
        experimental: false,
        has_footer: false,
        compressed: false,
        unknown_flags: 0,
    };

    // With the exception of the version 2.2 compression flag, flag bits were added
    // sequentially each major version.
    let mut known = 0x80;

    if major_version == 2 {
        header.compressed = flags & 0x40 != 0;
        known |= 0x40;
    }

    if major_version >= 3 {
        header.has_extended_header = flags & 0x40 != 0;
        header.experimental = flags & 0x20 != 0;
        known |= 0x60;
    }

    if major_version >= 4 {
        header.has_footer = flags & 0x10 != 0;
        known |= 0x10;
    }

    header.unknown_flags = flags & !known;

    Some(header)
}

#[derive(Debug, Default)]
struct ExtendedHeader {
    /// ID3v2.3 only, the number of padding bytes.
    padding_size: Option<u32>,
    /// ID3v2.3+, a CRC32 checksum of the tag.
    crc32: Option<u32>,
    /// ID3v2.4 only, is this tag an update to an earlier tag.
    is_update: Option<bool>,
    /// ID3v2.4 only, tag modification restrictions.
    restrictions: Option<Restrictions>,
}

#[derive(Debug)]
#[allow(dead_code)]
struct Restrictions {
    tag_size: TagSizeRestriction,
    text_encoding: TextEncodingRestriction,
    text_field_size: TextFieldSize,
    image_encoding: ImageEncodingRestriction,
    image_size: ImageSizeRestriction,
}

/// Read the extended header of an ID3v2.3 tag.
fn read_extended_header_2p3(reader: &mut BufReader<'_>) -> Result<ExtendedHeader> {
    // The size of the extended header, excluding the size field itself.
    let size = reader.read_be_u32()?;
    let flags = reader.read_be_u16()?;
    let padding_size = reader.read_be_u32()?;

    if size != 6 && size != 10 {
        return decode_error("id3v2: invalid extended header size");
    }

    let mut header = ExtendedHeader { padding_size: Some(padding_size), ..Default::default() };

    // CRC32 flag.
    if size == 10 && flags & 0x8000 != 0 {
        header.crc32 = Some(reader.read_be_u32()?);
    }

    Ok(header)
}

/// Read the extended header of an ID3v2.4 tag.
fn read_extended_header_2p4(reader: &mut BufReader<'_>) -> Result<ExtendedHeader> {
    // The size of the extended header, including the size field itself.
    let _size = read_syncsafe_leq32(reader, 28)?;

    // One byte gives the number of flag bytes that follow. Only the first flag byte carries
    // defined bits.
    let count = reader.read_u8()?;

    if count == 0 {
        return decode_error("id3v2: extended header carries no flag bytes");
    }

    let flags = reader.read_u8()?;
    reader.ignore_bytes(u64::from(count) - 1)?;

    let mut header = ExtendedHeader { is_update: Some(false), ..Default::default() };

    // Tag is an update flag. Carries no data, so the attached length must be 0.
    if flags & 0x40 != 0x0 {
        if reader.read_u8()? != 0 {
            return decode_error("id3v2: is-update extended flag has invalid size");
        }

        header.is_update = Some(true);
    }

    // CRC32 flag. The checksum is stored as 5 syncsafe bytes.
    if flags & 0x20 != 0x0 {
        if reader.read_u8()? != 5 {
            return decode_error("id3v2: CRC32 extended flag has invalid size");
        }

        header.crc32 = Some(read_syncsafe_leq32(reader, 32)?);
    }

    // Restrictions flag.
    if flags & 0x10 != 0x0 {
        if reader.read_u8()? != 1 {
            return decode_error("id3v2: restrictions extended flag has invalid size");
        }

        let restrictions = reader.read_u8()?;

        let tag_size = match (restrictions & 0xc0) >> 6 {
            0 => TagSizeRestriction::Max128Frames1024KiB,
            1 => TagSizeRestriction::Max64Frames128KiB,
            2 => TagSizeRestriction::Max32Frames40KiB,
            3 => TagSizeRestriction::Max32Frames4KiB,
            _ => unreachable!(),
        };

        let text_encoding = match (restrictions & 0x20) >> 5 {
            0 => TextEncodingRestriction::None,
            1 => TextEncodingRestriction::Utf8OrIso88591,
            _ => unreachable!(),
        };

        let text_field_size = match (restrictions & 0x18) >> 3 {
            0 => TextFieldSize::None,
            1 => TextFieldSize::Max1024Characters,
            2 => TextFieldSize::Max128Characters,
            3 => TextFieldSize::Max30Characters,
            _ => unreachable!(),
        };

        let image_encoding = match (restrictions & 0x04) >> 2 {
            0 => ImageEncodingRestriction::None,
            1 => ImageEncodingRestriction::PngOrJpegOnly,
            _ => unreachable!(),
        };

        let image_size = match restrictions & 0x03 {
            0 => ImageSizeRestriction::None,
            1 => ImageSizeRestriction::LessThan256x256,
            2 => ImageSizeRestriction::LessThan64x64,
            3 => ImageSizeRestriction::Exactly64x64,
            _ => unreachable!(),
        };

        header.restrictions = Some(Restrictions {
            tag_size,
            text_encoding,
            text_field_size,
            image_encoding,
            image_size,
        });
    }

    Ok(header)
}

/// One detected ID3v2 tag being parsed.
struct Id3v2Reader {
    header: TagHeader,
    version: &'static VersionInfo,
    container: Container,
}

impl Id3v2Reader {
    fn new(header: TagHeader, version: &'static VersionInfo) -> Self {
        let mut container = Container::new(version.format_name);
        container.version = (header.major_version, header.minor_version);
        container.flags = header.flags;
        container.is_experimental = header.experimental;
        container.has_footer = header.has_footer;
        container.length = u64::from(header.size);

        Id3v2Reader { header, version, container }
    }
}

impl ContainerReader for Id3v2Reader {
    fn format_name(&self) -> &'static str {
        self.version.format_name
    }

    fn body_len(&self) -> u64 {
        u64::from(self.header.size)
    }

    fn read_stream(&mut self, _src: &mut dyn ReadBytes, _ctx: &DecodeContext<'_>) -> Result<()> {
        // Only a zero-length tag reaches the streaming path; it has no extended header,
        // frames, or padding.
        Ok(())
    }

    fn read_body(&mut self, body: Box<[u8]>, ctx: &DecodeContext<'_>) -> Result<()> {
        if self.header.unknown_flags != 0 {
            warn!("id3v2: non-standard tag flag bits 0x{:02x}", self.header.unknown_flags);
            self.container
                .push_warning(format!("non-standard tag flag bits 0x{:02x}", self.header.unknown_flags));
        }

        // If the unsynchronisation flag is set, the whole tag body must be decoded before
        // being read for versions before 2.4. Version 2.4 unsynchronises individual frames.
        let body = if self.header.unsynchronisation && self.header.major_version < 4 {
            match unsync::decode_unsynchronisation(&body) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!("id3v2: {}", err);
                    self.container.length = 0;
                    self.container.push_warning(format!("tag body retained raw: {}", err));
                    return Ok(());
                }
            }
        }
        else {
            body.into_vec()
        };

        // A compressed ID3v2.2 tag does not define a compression scheme; keep a stub.
        if self.header.compressed {
            self.container.length = body.len() as u64;
            self.container.push_warning("compressed tag kept as a stub");
            return Ok(());
        }

        let mut reader = BufReader::new(&body);

        // If there is an extended header, read and parse it based on the major version of the
        // tag.
        let extended = match self.header.has_extended_header {
            true => match self.header.major_version {
                3 => Some(read_extended_header_2p3(&mut reader)?),
                4 => Some(read_extended_header_2p4(&mut reader)?),
                _ => None,
            },
            false => None,
        };

        if let Some(ref extended) = extended {
            trace!("{:#?}", extended);

            self.container.is_update = extended.is_update.unwrap_or(false);
            self.container.crc = extended.crc32;
        }

        // Everything after the extended header is the field region. Its length is fixed here,
        // before field parsing begins, and accounts for every frame plus trailing padding.
        let region = &body[reader.pos() as usize..];
        self.container.length = region.len() as u64;

        // Verify the stored checksum, when one is present. ID3v2.3 excludes the trailing
        // padding from the checksummed data; ID3v2.4 includes it.
        if let Some(stored) = self.container.crc {
            let checked = match self.header.major_version {
                3 => {
                    let padding =
                        extended.as_ref().and_then(|ext| ext.padding_size).unwrap_or(0) as usize;
                    &region[..region.len().saturating_sub(padding)]
                }
                _ => region,
            };

            let computed = CRC32.checksum(checked);

            if computed != stored {
                warn!("id3v2: CRC32 mismatch, stored {:#010x}, computed {:#010x}", stored, computed);
                self.container.push_warning(format!(
                    "CRC32 mismatch, stored {:#010x}, computed {:#010x}",
                    stored, computed
                ));
            }
        }

        // Parse the frames. Field decoders see the tag's own format name.
        let ctx = DecodeContext { format: Some(self.version.format_name), ..*ctx };

        let mut region_reader = BufReader::new(region);

        frames::read_frames(
            &mut region_reader,
            self.version,
            &ctx,
            &mut self.container.fields,
            &mut self.container.warnings,
        );

        Ok(())
    }

    fn finish(self: Box<Self>) -> Container {
        self.container
    }
}

fn validate_id3v2p2(prefix: &[u8]) -> Option<Box<dyn ContainerReader>> {
    let header = parse_tag_header(prefix)?;

    if header.major_version != 2 {
        return None;
    }

    Some(Box::new(Id3v2Reader::new(header, &ID3V2P2)))
}

fn validate_id3v2p3(prefix: &[u8]) -> Option<Box<dyn ContainerReader>> {
    let header = parse_tag_header(prefix)?;

    if header.major_version != 3 {
        return None;
    }

    Some(Box::new(Id3v2Reader::new(header, &ID3V2P3)))
}

fn validate_id3v2p4(prefix: &[u8]) -> Option<Box<dyn ContainerReader>> {
    let header = parse_tag_header(prefix)?;

    if header.major_version != 4 {
        return None;
    }

    Some(Box::new(Id3v2Reader::new(header, &ID3V2P4)))
}

/// The ID3v2 metadata format family.
pub struct Id3v2Format;

impl RegisterableFormat for Id3v2Format {
    fn register(registry: &mut FormatRegistry) {
        registry.register_container(ID3V2P2.format_name, TAG_HEADER_LEN, validate_id3v2p2);
        registry.register_container(ID3V2P3.format_name, TAG_HEADER_LEN, validate_id3v2p3);
        registry.register_container(ID3V2P4.format_name, TAG_HEADER_LEN, validate_id3v2p4);

        frames::register_frame_decoders(registry);
    }
}
