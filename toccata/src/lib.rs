// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Toccata
//!
//! Toccata is a 100% pure Rust media metadata tag parsing framework.
//!
//! A tag is parsed in three steps:
//!
//! 1. A [`FormatRegistry`][core::registry::FormatRegistry] is populated with the container
//!    validators and field decoders of every format of interest. Use
//!    [`default::get_registry`] to get a registry with all supported formats pre-registered,
//!    or build a custom one with [`default::register_enabled_formats`]. The registry is a
//!    read-only snapshot once parsing begins.
//! 2. A [`Dispatcher`][core::dispatch::Dispatcher] walks a byte source (a
//!    [`BufReader`][core::io::BufReader] over a slice, or a
//!    [`ReadStream`][core::io::ReadStream] over any [`std::io::Read`]) and detects
//!    containers by their header signatures.
//! 3. Each detected [`Container`][core::meta::Container] carries its parsed
//!    [`Field`][core::meta::Field]s, each with typed [`Value`][core::meta::Value]s, a system
//!    name, an optional human-readable name and subtitle, and any advisory warnings.
//!
//! The [`parse`] and [`parse_with_options`] functions bundle these steps for the common case.
//!
//! # Formats
//!
//! The following metadata formats are supported: ID3v2.2, ID3v2.3, and ID3v2.4.
//!
//! # Adding support for new formats
//!
//! Implement the [`RegisterableFormat`][core::registry::RegisterableFormat] trait for the
//! format and register it with the registry!

pub use toccata_core as core;
pub use toccata_metadata as metadata;

use toccata_core::dispatch::{Dispatcher, ParseOptions};
use toccata_core::errors::Result;
use toccata_core::io::ReadBytes;
use toccata_core::meta::Container;

pub mod default {
    //! The `default` module provides convenience functions and a pre-built registry to get an
    //! implementer up-and-running as quickly as possible, and to reduce boiler-plate. Using
    //! the `default` module is completely optional and incurs no overhead unless actually
    //! used.

    use lazy_static::lazy_static;

    use toccata_core::registry::FormatRegistry;

    pub mod formats {
        //! The `formats` module re-exports all enabled Toccata metadata formats.

        pub use toccata_metadata::id3v2::Id3v2Format;
    }

    lazy_static! {
        static ref REGISTRY: FormatRegistry = {
            let mut registry = FormatRegistry::new();
            register_enabled_formats(&mut registry);
            registry
        };
    }

    /// Gets the default `FormatRegistry`. This registry pre-registers all supported metadata
    /// formats.
    ///
    /// This function is lazy and does not instantiate the `FormatRegistry` until the first
    /// call to this function.
    pub fn get_registry() -> &'static FormatRegistry {
        &REGISTRY
    }

    /// Registers all supported metadata formats on the provided `FormatRegistry`.
    ///
    /// Use this function to easily populate a custom registry.
    pub fn register_enabled_formats(registry: &mut FormatRegistry) {
        registry.register_all::<formats::Id3v2Format>();
    }
}

/// Parses all containers recognizable at the head of the source using the default registry
/// and options.
pub fn parse<B: ReadBytes>(src: &mut B) -> Result<Vec<Container>> {
    Dispatcher::new(default::get_registry()).parse(src)
}

/// Parses all containers recognizable at the head of the source using the default registry
/// and the provided options.
pub fn parse_with_options<B: ReadBytes>(
    src: &mut B,
    opts: ParseOptions,
) -> Result<Vec<Container>> {
    Dispatcher::with_options(default::get_registry(), opts).parse(src)
}
