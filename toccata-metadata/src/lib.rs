// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Metadata tag parsers for Project Toccata.
//!
//! Each metadata format implements
//! [`RegisterableFormat`](toccata_core::registry::RegisterableFormat) and registers its
//! container validators and field decoders with a
//! [`FormatRegistry`](toccata_core::registry::FormatRegistry). The
//! [`Dispatcher`](toccata_core::dispatch::Dispatcher) then detects and parses tags from any
//! byte source.

pub mod id3v2;
