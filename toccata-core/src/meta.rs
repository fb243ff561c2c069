// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `meta` module defines the metadata data model: containers, fields, and values.

use std::fmt;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDateTime};

pub use crate::util::key::FieldId;

/// Localization lookup collaborator.
///
/// Field decoders resolve human-readable names and localized value fragments through this
/// single function. When it returns `None` (or no function is provided at all), decoders fall
/// back to a reasonable built-in rendering.
pub type LookupFn = fn(&str) -> Option<String>;

/// ISO-639 language name collaborator. Optional; language codes pass through verbatim when it
/// is absent.
pub type LanguageFn = fn(&[u8; 3]) -> Option<String>;

/// A point-in-time, or range, parsed from an ISO-8601 style timestamp string.
#[derive(Clone, Debug, PartialEq)]
pub struct Timestamp {
    /// The start of the timestamp or range.
    pub start: NaiveDateTime,
    /// The UTC offset, if one was written.
    pub offset: Option<FixedOffset>,
    /// The end of the range, if the timestamp was written as a range.
    pub end: Option<NaiveDateTime>,
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format("%Y-%m-%dT%H:%M:%S"))?;

        if let Some(offset) = self.offset {
            write!(f, "{}", offset)?;
        }

        if let Some(end) = self.end {
            write!(f, "/{}", end.format("%Y-%m-%dT%H:%M:%S"))?;
        }

        Ok(())
    }
}

/// An embedded image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    /// The Media Type (MIME Type) used to encode the image.
    pub media_type: String,
    /// The image data, encoded as per `media_type`.
    pub data: Box<[u8]>,
}

/// A `Field` value.
///
/// Note: The data types in this enumeration are a generalization. Depending on the particular
/// wire format, the actual data type of a specific field may have a lesser width or encoding
/// than the data type in this enumeration.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A binary buffer.
    Binary(Box<[u8]>),
    /// A string. This is also the catch-all type for fields with unconventional data types.
    String(String),
    /// An unsigned integer.
    UnsignedInt(u64),
    /// A span of time.
    Duration(Duration),
    /// A point-in-time, or range.
    Timestamp(Timestamp),
    /// An embedded image.
    Image(ImageData),
}

macro_rules! impl_from_for_value {
    ($value:ident, $from:ty, $conv:expr) => {
        impl From<$from> for Value {
            fn from($value: $from) -> Self {
                $conv
            }
        }
    };
}

impl_from_for_value!(v, &[u8], Value::Binary(Box::from(v)));
impl_from_for_value!(v, Box<[u8]>, Value::Binary(v));
impl_from_for_value!(v, u8, Value::UnsignedInt(u64::from(v)));
impl_from_for_value!(v, u16, Value::UnsignedInt(u64::from(v)));
impl_from_for_value!(v, u32, Value::UnsignedInt(u64::from(v)));
impl_from_for_value!(v, u64, Value::UnsignedInt(v));
impl_from_for_value!(v, &str, Value::String(String::from(v)));
impl_from_for_value!(v, String, Value::String(v));
impl_from_for_value!(v, Duration, Value::Duration(v));
impl_from_for_value!(v, Timestamp, Value::Timestamp(v));
impl_from_for_value!(v, ImageData, Value::Image(v));

fn buffer_to_hex_string(buf: &[u8]) -> String {
    let mut output = String::with_capacity(5 * buf.len());

    for ch in buf {
        let u = (ch & 0xf0) >> 4;
        let l = ch & 0x0f;
        output.push_str("\\0x");
        output.push(if u < 10 { (b'0' + u) as char } else { (b'a' + u - 10) as char });
        output.push(if l < 10 { (b'0' + l) as char } else { (b'a' + l - 10) as char });
    }

    output
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Implement default formatters for each type.
        match self {
            Value::Binary(ref buf) => f.write_str(&buffer_to_hex_string(buf)),
            Value::String(ref string) => fmt::Display::fmt(string, f),
            Value::UnsignedInt(uint) => fmt::Display::fmt(uint, f),
            Value::Duration(duration) => write!(f, "{}ms", duration.as_millis()),
            Value::Timestamp(ref ts) => fmt::Display::fmt(ts, f),
            Value::Image(ref image) => {
                write!(f, "<{}, {} bytes>", image.media_type, image.data.len())
            }
        }
    }
}

/// A `Field` is one named entry inside a container.
///
/// A field always retains its raw wire form: `header` is the field header exactly as read, and
/// `data` is the field body exactly as read, so that `data.len()` equals the length declared by
/// the header. Everything else is derived during decoding.
#[derive(Clone, Debug, Default)]
pub struct Field {
    /// The raw field header bytes.
    pub header: Box<[u8]>,
    /// The raw field body bytes, in wire form (before any per-field unsynchronisation
    /// reversal).
    pub data: Box<[u8]>,
    /// The system name: the field identifier as it appears on the wire.
    pub id: FieldId,
    /// The human-readable field name, if one could be resolved through the localization lookup.
    pub name: Option<String>,
    /// A secondary display string, e.g. a user-text description or an owner identifier.
    pub subtitle: Option<String>,
    /// The raw field flag bits, if the format defines them.
    pub flags: Option<u16>,
    /// The grouping identifier byte, if the field is grouped.
    pub group: Option<u8>,
    /// The encryption method identifier byte, if the field is encrypted.
    pub encryption_method: Option<u8>,
    /// The decoded values, in wire order.
    pub values: Vec<Value>,
    /// Indicates the field carries raw data that could not be decoded into `values` (unknown,
    /// encrypted, or malformed fields).
    pub has_hidden_data: bool,
    /// Advisory warnings attached while decoding. Intended for debug logs, not display.
    pub warnings: Vec<String>,
}

impl Field {
    /// Create a new field from its raw header and body bytes.
    pub fn new(header: Box<[u8]>, data: Box<[u8]>, id: FieldId) -> Field {
        Field { header, data, id, ..Default::default() }
    }

    /// The length of the field body as declared by its header.
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// The best display name for the field: the resolved human-readable name if one exists, the
    /// system name otherwise.
    pub fn display_name(&self) -> String {
        match self.name {
            Some(ref name) => name.clone(),
            None => self.id.to_string(),
        }
    }

    /// Attach an advisory warning to the field.
    pub fn push_warning<S: Into<String>>(&mut self, warning: S) {
        self.warnings.push(warning.into());
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ id={}", self.id)?;

        if let Some(ref subtitle) = self.subtitle {
            write!(f, ", subtitle=\"{}\"", subtitle)?;
        }

        write!(f, ", values=[")?;

        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }

        write!(f, "] }}")
    }
}

/// A `Container` is one top-level metadata block occupying a contiguous byte range with its own
/// header.
#[derive(Debug, Default)]
pub struct Container {
    /// The name of the format that produced this container.
    pub format: &'static str,
    /// The format version as a (major, minor) pair, or `(0, 0)` if the format is unversioned.
    pub version: (u8, u8),
    /// The raw header flags byte.
    pub flags: u8,
    /// The byte size of the field region of the body. Fixed before field parsing begins; equals
    /// the sum of all field header and body lengths plus any trailing padding.
    pub length: u64,
    /// The container is flagged as experimental.
    pub is_experimental: bool,
    /// The container is followed by a footer.
    pub has_footer: bool,
    /// The container is an update to an earlier container in the same stream.
    pub is_update: bool,
    /// The checksum stored in the container header, if one was written.
    pub crc: Option<u32>,
    /// The parsed fields, in wire order.
    pub fields: Vec<Field>,
    /// The stream ended before the declared body length was reached; `fields` holds whatever
    /// could be parsed.
    pub lost_tail: bool,
    /// Advisory warnings attached while parsing. Intended for debug logs, not display.
    pub warnings: Vec<String>,
}

impl Container {
    /// Create a new, empty container for the named format.
    pub fn new(format: &'static str) -> Container {
        Container { format, ..Default::default() }
    }

    /// Gets an immutable slice of the fields in this container.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Attach an advisory warning to the container.
    pub fn push_warning<S: Into<String>>(&mut self, warning: S) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_value_display() {
        assert_eq!(Value::from("Hello").to_string(), "Hello");
        assert_eq!(Value::from(42u32).to_string(), "42");
        assert_eq!(Value::Binary(Box::from(&[0xab, 0x05][..])).to_string(), "\\0xab\\0x05");
        assert_eq!(Value::Duration(Duration::from_millis(1500)).to_string(), "1500ms");
    }

    #[test]
    fn verify_field_system_name() {
        let header = Box::from(&b"TIT2\x00\x00\x00\x05\x00\x00"[..]);
        let field = Field::new(header, Box::from(&[0u8; 5][..]), FieldId(*b"TIT2"));

        // The system name always equals the leading header bytes.
        assert_eq!(&field.header[0..4], field.id.as_bytes());
        assert_eq!(field.length(), 5);
        assert_eq!(field.display_name(), "TIT2");
    }
}
