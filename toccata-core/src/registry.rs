// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `registry` module provides the format registry: a table of container validators and
//! field descriptors that drives the dispatch engine.
//!
//! A registry is built once at startup, after which it is treated as a read-only snapshot.
//! Registration requires exclusive access; parsing requires only shared access.

use std::collections::HashMap;

use log::debug;

use crate::errors::{unsupported_error, Result};
use crate::io::{BufReader, ReadBytes};
use crate::meta::{Container, Field, FieldId, LanguageFn, LookupFn};

/// A container validator function inspects a fixed-length prefix of the stream and, when it
/// recognizes its format, yields a reader for the container that starts there.
pub type ContainerValidatorFn = fn(&[u8]) -> Option<Box<dyn ContainerReader>>;

/// A container validator paired with the prefix length it requires.
#[derive(Copy, Clone)]
pub struct ContainerValidator {
    /// The number of prefix bytes the validator must be shown.
    pub peek_len: usize,
    /// The validation function.
    pub validate: ContainerValidatorFn,
}

/// A field decoder function consumes a field's preprocessed payload and fills in the field's
/// values, subtitle, and name.
pub type FieldDecoderFn = fn(BufReader<'_>, &mut Field, &DecodeContext<'_>) -> Result<()>;

/// A `FieldDescriptor` binds a four-byte field identifier to its decoder.
#[derive(Copy, Clone)]
pub struct FieldDescriptor {
    /// The field identifier.
    pub id: FieldId,
    /// The number of header bytes required to frame the field.
    pub peek_len: usize,
    /// The payload decoder.
    pub decode: FieldDecoderFn,
}

/// A `FormatDescriptor` describes one registered format: its container validators, in
/// registration order, and its field registry.
pub struct FormatDescriptor {
    /// The format name.
    pub name: &'static str,
    /// Container validators in registration order. The first validator to accept a stream
    /// prefix wins.
    pub validators: Vec<ContainerValidator>,
    /// Maps field identifiers to field descriptors.
    pub fields: HashMap<FieldId, FieldDescriptor>,
}

/// A `FormatRegistry` holds all registered formats, in registration order.
#[derive(Default)]
pub struct FormatRegistry {
    formats: Vec<FormatDescriptor>,
}

impl FormatRegistry {
    /// Instantiate a new, empty `FormatRegistry`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Finds the descriptor for a format name, creating an empty one if it does not exist yet.
    fn entry(&mut self, name: &'static str) -> &mut FormatDescriptor {
        if let Some(at) = self.formats.iter().position(|desc| desc.name == name) {
            return &mut self.formats[at];
        }

        self.formats.push(FormatDescriptor { name, validators: Vec::new(), fields: HashMap::new() });
        self.formats.last_mut().unwrap()
    }

    /// Registers a container validator for the named format. A format may register any number
    /// of validators; they are tried in registration order.
    pub fn register_container(
        &mut self,
        name: &'static str,
        peek_len: usize,
        validate: ContainerValidatorFn,
    ) {
        debug_assert!(peek_len > 0);
        self.entry(name).validators.push(ContainerValidator { peek_len, validate });
    }

    /// Registers a field decoder for the named format, implicitly creating the format entry if
    /// it does not exist. Re-registering an identifier replaces the previous binding
    /// (last-writer-wins).
    pub fn register_field(
        &mut self,
        name: &'static str,
        id: FieldId,
        peek_len: usize,
        decode: FieldDecoderFn,
    ) {
        let descriptor = FieldDescriptor { id, peek_len, decode };

        if self.entry(name).fields.insert(id, descriptor).is_some() {
            debug!("replaced field descriptor for '{}' in format '{}'", id, name);
        }
    }

    /// Registers everything a format provides in one call.
    pub fn register_all<F: RegisterableFormat>(&mut self) {
        F::register(self);
    }

    /// Gets all registered format descriptors, in registration order.
    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    /// Gets the descriptor for the named format.
    pub fn format(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|desc| desc.name == name)
    }

    /// Gets the container validators registered for the named format, in registration order.
    pub fn validators_for(&self, name: &str) -> &[ContainerValidator] {
        self.format(name).map(|desc| desc.validators.as_slice()).unwrap_or(&[])
    }

    /// Gets the field descriptor registered for an identifier in the named format.
    pub fn field_descriptor(&self, name: &str, id: FieldId) -> Option<&FieldDescriptor> {
        self.format(name).and_then(|desc| desc.fields.get(&id))
    }

    /// Gets the complete field registry of the named format for introspection.
    pub fn field_types(&self, name: &str) -> Option<&HashMap<FieldId, FieldDescriptor>> {
        self.format(name).map(|desc| &desc.fields)
    }
}

/// A format implements `RegisterableFormat` to support bulk registration of its container
/// validators and field descriptors with [`FormatRegistry::register_all`].
pub trait RegisterableFormat {
    /// Register all validators and field descriptors the format provides.
    fn register(registry: &mut FormatRegistry);
}

/// A `ContainerReader` parses the body of one detected container.
///
/// A reader is produced by a container validator after it has verified the container header.
/// The dispatch engine then frames the container body and hands it over for parsing.
pub trait ContainerReader {
    /// The name of the format this reader belongs to.
    fn format_name(&self) -> &'static str;

    /// The byte length of the container body framed by the header. This is fixed by the header
    /// before any parsing begins. A length of 0 indicates the format self-terminates and must
    /// be read directly from the stream via [`ContainerReader::read_stream`].
    fn body_len(&self) -> u64;

    /// Parse the framed container body. `body` may be shorter than `body_len` if the source
    /// ended early; implementations parse what they can.
    fn read_body(&mut self, body: Box<[u8]>, ctx: &DecodeContext<'_>) -> Result<()>;

    /// Parse a self-terminating container directly from the stream.
    fn read_stream(&mut self, _src: &mut dyn ReadBytes, _ctx: &DecodeContext<'_>) -> Result<()> {
        unsupported_error("core (registry): container does not support streaming reads")
    }

    /// Consume the reader, yielding the parsed container.
    fn finish(self: Box<Self>) -> Container;
}

/// A `DecodeContext` carries the shared, read-only collaborators available to container and
/// field parsing: the registry snapshot and the external lookup functions.
#[derive(Copy, Clone)]
pub struct DecodeContext<'a> {
    /// The registry snapshot.
    pub registry: &'a FormatRegistry,
    /// The name of the format currently being decoded. The dispatch engine leaves this unset;
    /// a container fills it in before decoding fields so that field decoders may consult
    /// their own format's registry.
    pub format: Option<&'static str>,
    /// The localization lookup collaborator.
    pub lookup: Option<LookupFn>,
    /// The ISO-639 language name collaborator.
    pub language_name: Option<LanguageFn>,
}

impl DecodeContext<'_> {
    /// Resolve a localized string for `key`.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.lookup.and_then(|lookup| lookup(key))
    }

    /// Resolve a localized string for `key`, falling back to `fallback` when the lookup
    /// collaborator is absent or has no entry.
    pub fn localize(&self, key: &str, fallback: &str) -> String {
        self.lookup(key).unwrap_or_else(|| fallback.to_string())
    }

    /// Resolve a language name for an ISO-639 code, if the collaborator is present.
    pub fn language(&self, code: &[u8; 3]) -> Option<String> {
        self.language_name.and_then(|language| language(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept_nothing(_: &[u8]) -> Option<Box<dyn ContainerReader>> {
        None
    }

    fn decode_nothing(_: BufReader<'_>, _: &mut Field, _: &DecodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn decode_other(_: BufReader<'_>, field: &mut Field, _: &DecodeContext<'_>) -> Result<()> {
        field.push_warning("other");
        Ok(())
    }

    #[test]
    fn verify_registration_order() {
        let mut registry = FormatRegistry::new();
        registry.register_container("b", 4, accept_nothing);
        registry.register_container("a", 8, accept_nothing);
        registry.register_container("b", 2, accept_nothing);

        let names: Vec<&str> = registry.formats().iter().map(|desc| desc.name).collect();
        assert_eq!(names, &["b", "a"]);

        // Validators within a format stay in registration order.
        let peeks: Vec<usize> =
            registry.validators_for("b").iter().map(|val| val.peek_len).collect();
        assert_eq!(peeks, &[4, 2]);
    }

    #[test]
    fn verify_field_registration_creates_format() {
        let mut registry = FormatRegistry::new();

        // Registering a field on an unknown format name implicitly creates the format entry.
        registry.register_field("new", FieldId(*b"ABCD"), 10, decode_nothing);

        assert!(registry.format("new").is_some());
        assert!(registry.validators_for("new").is_empty());
        assert!(registry.field_descriptor("new", FieldId(*b"ABCD")).is_some());
    }

    #[test]
    fn verify_field_registration_last_writer_wins() {
        let mut registry = FormatRegistry::new();
        registry.register_field("fmt", FieldId(*b"ABCD"), 10, decode_nothing);
        registry.register_field("fmt", FieldId(*b"ABCD"), 10, decode_other);

        let descriptor = registry.field_descriptor("fmt", FieldId(*b"ABCD")).unwrap();
        assert_eq!(descriptor.decode as usize, decode_other as usize);
        assert_eq!(registry.field_types("fmt").unwrap().len(), 1);
    }

    #[test]
    fn verify_unknown_format_lookups() {
        let registry = FormatRegistry::new();

        assert!(registry.format("none").is_none());
        assert!(registry.validators_for("none").is_empty());
        assert!(registry.field_descriptor("none", FieldId(*b"ABCD")).is_none());
        assert!(registry.field_types("none").is_none());
    }
}
