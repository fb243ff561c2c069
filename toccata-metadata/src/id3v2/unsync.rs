// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The ID3v2 unsynchronisation scheme and "syncsafe" integers.
//!
//! Unsynchronisation is a byte-stuffing scheme that prevents tag data from aliasing an MPEG
//! audio synchronisation word: a `0x00` is stuffed after every `0xFF` that would otherwise be
//! followed by a byte `>= 0xE0` (or by `0x00`). Syncsafe integers serve the same purpose for
//! size fields by leaving the high bit of every byte cleared.

use toccata_core::errors::{Error, Result};
use toccata_core::io::ReadBytes;

/// Reads an up-to 32-bit unsigned big-endian syncsafe integer from the stream.
///
/// A syncsafe integer carries 7 significant bits per encoded byte. `bit_width` selects the
/// number of significant bits in the decoded value; the number of encoded bytes follows from
/// it. Returns an overflow error if the encoded value does not fit `bit_width` bits.
pub fn read_syncsafe_leq32<B: ReadBytes>(reader: &mut B, bit_width: u32) -> Result<u32> {
    debug_assert!(bit_width > 0 && bit_width <= 32);

    // The number of encoded bytes required to carry bit_width significant bits.
    let count = (bit_width + 6) / 7;

    let mut value = 0u64;

    for _ in 0..count {
        value = (value << 7) | u64::from(reader.read_u8()? & 0x7f);
    }

    if value >> bit_width != 0 {
        return Err(Error::Overflow("id3v2: syncsafe integer exceeds its bit width"));
    }

    Ok(value as u32)
}

/// Decodes unsynchronised data into its original form.
///
/// Returns an invalid-unsynchronisation error when a `0xFF` is followed by a byte `>= 0xE0`:
/// such a pair cannot occur in correctly unsynchronised data.
pub fn decode_unsynchronisation(buf: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(buf.len());
    let mut at = 0;

    while at < buf.len() {
        let byte = buf[at];
        out.push(byte);
        at += 1;

        if byte == 0xff {
            match buf.get(at) {
                // Drop the stuffed null.
                Some(0x00) => at += 1,
                Some(&next) if next >= 0xe0 => return Err(Error::InvalidUnsynchronization),
                _ => (),
            }
        }
    }

    Ok(out)
}

/// Applies the unsynchronisation scheme to data.
///
/// A `0x00` is stuffed after every `0xFF` that is the final byte, or that is followed by a
/// byte `>= 0xE0` or `0x00`.
pub fn encode_unsynchronisation(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());

    for (at, &byte) in buf.iter().enumerate() {
        out.push(byte);

        if byte == 0xff {
            match buf.get(at + 1) {
                None => out.push(0x00),
                Some(&next) if next >= 0xe0 || next == 0x00 => out.push(0x00),
                _ => (),
            }
        }
    }

    out
}
