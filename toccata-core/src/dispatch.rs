// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `dispatch` module implements the container dispatch engine.
//!
//! The engine walks a byte source from its current position and repeatedly tests the stream
//! prefix against every registered container validator. When a validator accepts, the engine
//! frames the container body, hands it to the container's reader, collects the result, and
//! moves on to the position after the container. When nothing accepts, the walk stops.
//!
//! Peeked bytes are held in a scratch buffer owned by the engine, so a rejected validation
//! never loses data: the same prefix is offered to the next validator, and any bytes peeked
//! past a container header are credited towards its body.

use std::cmp;

use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::io::ReadBytes;
use crate::meta::{Container, LanguageFn, LookupFn};
use crate::registry::{ContainerReader, DecodeContext, FormatRegistry};

/// `ParseOptions` is the common set of options controlling a dispatch run.
#[derive(Default)]
pub struct ParseOptions {
    /// Format names eligible for dispatch. `None` dispatches every registered format.
    pub formats: Option<Vec<String>>,
    /// The localization lookup collaborator.
    pub lookup: Option<LookupFn>,
    /// The ISO-639 language name collaborator.
    pub language_name: Option<LanguageFn>,
}

/// `Dispatcher` discovers and parses containers from a byte source using a registry snapshot.
pub struct Dispatcher<'r> {
    registry: &'r FormatRegistry,
    opts: ParseOptions,
}

impl<'r> Dispatcher<'r> {
    /// Instantiate a `Dispatcher` over a registry snapshot with default options.
    pub fn new(registry: &'r FormatRegistry) -> Self {
        Dispatcher { registry, opts: Default::default() }
    }

    /// Instantiate a `Dispatcher` over a registry snapshot with the provided options.
    pub fn with_options(registry: &'r FormatRegistry, opts: ParseOptions) -> Self {
        Dispatcher { registry, opts }
    }

    fn is_eligible(&self, name: &str) -> bool {
        match self.opts.formats {
            Some(ref names) => names.iter().any(|n| n == name),
            None => true,
        }
    }

    /// Parses all containers recognizable at the head of the source, in stream order.
    ///
    /// Parsing stops at the first position where no registered validator accepts the stream
    /// prefix. Only errors from the underlying source abort; malformed containers degrade to
    /// partial results with attached warnings.
    pub fn parse<B: ReadBytes>(&self, src: &mut B) -> Result<Vec<Container>> {
        let ctx = DecodeContext {
            registry: self.registry,
            format: None,
            lookup: self.opts.lookup,
            language_name: self.opts.language_name,
        };

        let mut containers = Vec::new();
        let mut scratch = Vec::new();

        'scan: loop {
            for format in self.registry.formats().iter().filter(|f| self.is_eligible(f.name)) {
                for validator in &format.validators {
                    // Top up the scratch buffer to the validator's peek length. If the stream
                    // ends first this validator cannot match, but a later one with a shorter
                    // peek length still might.
                    if !top_up(src, &mut scratch, validator.peek_len)? {
                        continue;
                    }

                    let reader = match (validator.validate)(&scratch[..validator.peek_len]) {
                        Some(reader) => reader,
                        None => continue,
                    };

                    debug!("detected '{}' container at {}", format.name, src.pos());

                    let container =
                        read_container(src, &mut scratch, reader, validator.peek_len, &ctx)?;

                    containers.push(container);
                    continue 'scan;
                }
            }

            // No validator matched the current stream prefix.
            break;
        }

        Ok(containers)
    }
}

/// Top up `scratch` to `len` bytes from the source. Returns false if the source ended first.
fn top_up<B: ReadBytes>(src: &mut B, scratch: &mut Vec<u8>, len: usize) -> Result<bool> {
    let mut buf = [0u8; 64];

    while scratch.len() < len {
        let want = cmp::min(len - scratch.len(), buf.len());

        let count = src.read_buf(&mut buf[..want])?;
        if count == 0 {
            return Ok(false);
        }

        scratch.extend_from_slice(&buf[..count]);
    }

    Ok(true)
}

/// Frame and parse one container whose header occupies `scratch[..header_len]`.
fn read_container<B: ReadBytes>(
    src: &mut B,
    scratch: &mut Vec<u8>,
    mut reader: Box<dyn ContainerReader>,
    header_len: usize,
    ctx: &DecodeContext<'_>,
) -> Result<Container> {
    let body_len = reader.body_len() as usize;

    let result = if body_len == 0 {
        // The format self-terminates. Hand over the stream, replaying any bytes peeked past
        // the header first.
        let mut chained = ChainedSource::new(&scratch[header_len..], src);
        let result = reader.read_stream(&mut chained, ctx);
        scratch.clear();
        result
    }
    else {
        // Credit bytes peeked past the header towards the body, then read the remainder. A
        // short read yields a partial body.
        let buffered = cmp::min(scratch.len() - header_len, body_len);

        let mut body = Vec::with_capacity(body_len);
        body.extend_from_slice(&scratch[header_len..header_len + buffered]);

        // Bytes peeked past the body belong to the next container.
        let leftover = scratch.split_off(header_len + buffered);
        *scratch = leftover;

        if body.len() < body_len {
            let rest = src.read_boxed_slice(body_len - body.len())?;
            body.extend_from_slice(&rest);
        }

        let lost_tail = body.len() < body_len;

        if lost_tail {
            warn!("source ended {} bytes short of the container body", body_len - body.len());
        }

        let result = reader.read_body(body.into_boxed_slice(), ctx);

        match result {
            Ok(()) if lost_tail => {
                let mut container = reader.finish();
                container.lost_tail = true;
                container.push_warning("source ended before the declared container length");
                return Ok(container);
            }
            result => result,
        }
    };

    match result {
        Ok(()) => Ok(reader.finish()),
        // Errors from the underlying source abort the dispatch.
        Err(Error::IoError(err)) => Err(Error::IoError(err)),
        // Everything else degrades to a partial container with a warning.
        Err(err) => {
            warn!("container body could not be fully parsed: {}", err);

            let mut container = reader.finish();
            container.push_warning(format!("body could not be fully parsed: {}", err));
            Ok(container)
        }
    }
}

/// A `ChainedSource` replays a borrowed prefix before continuing with the inner source.
struct ChainedSource<'a, B: ReadBytes> {
    head: &'a [u8],
    at: usize,
    inner: &'a mut B,
}

impl<'a, B: ReadBytes> ChainedSource<'a, B> {
    fn new(head: &'a [u8], inner: &'a mut B) -> Self {
        ChainedSource { head, at: 0, inner }
    }
}

impl<B: ReadBytes> ReadBytes for ChainedSource<'_, B> {
    fn read_byte(&mut self) -> std::io::Result<u8> {
        if self.at < self.head.len() {
            self.at += 1;
            return Ok(self.head[self.at - 1]);
        }
        self.inner.read_byte()
    }

    fn read_double_bytes(&mut self) -> std::io::Result<[u8; 2]> {
        Ok([self.read_byte()?, self.read_byte()?])
    }

    fn read_triple_bytes(&mut self) -> std::io::Result<[u8; 3]> {
        Ok([self.read_byte()?, self.read_byte()?, self.read_byte()?])
    }

    fn read_quad_bytes(&mut self) -> std::io::Result<[u8; 4]> {
        Ok([self.read_byte()?, self.read_byte()?, self.read_byte()?, self.read_byte()?])
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.at < self.head.len() {
            let len = cmp::min(self.head.len() - self.at, buf.len());
            buf[..len].copy_from_slice(&self.head[self.at..self.at + len]);
            self.at += len;
            return Ok(len);
        }
        self.inner.read_buf(buf)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        let mut total = 0;

        while total < buf.len() {
            let count = self.read_buf(&mut buf[total..])?;
            if count == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "end of stream",
                ));
            }
            total += count;
        }

        Ok(())
    }

    fn ignore_bytes(&mut self, count: u64) -> std::io::Result<()> {
        for _ in 0..count {
            self.read_byte()?;
        }
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.inner.pos() + self.at as u64
    }
}
