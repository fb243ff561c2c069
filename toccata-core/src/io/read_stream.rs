// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io;

use super::ReadBytes;

const BUFFER_LEN: usize = 8 * 1024;

/// A `ReadStream` adapts any source implementing [`std::io::Read`] to [`ReadBytes`] with an
/// internal lookahead buffer.
pub struct ReadStream<R: io::Read> {
    /// The source reader.
    inner: R,
    /// The lookahead buffer.
    buf: Box<[u8]>,
    /// The position of the next byte to read within the buffer.
    pos: usize,
    /// The number of valid bytes within the buffer.
    end: usize,
    /// The absolute position of the start of the buffer within the source.
    base: u64,
}

impl<R: io::Read> ReadStream<R> {
    /// Instantiate a new `ReadStream` wrapping the provided reader.
    pub fn new(inner: R) -> Self {
        ReadStream { inner, buf: vec![0u8; BUFFER_LEN].into_boxed_slice(), pos: 0, end: 0, base: 0 }
    }

    /// Unwraps this `ReadStream`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Refill the buffer if it has been exhausted. Returns the number of bytes now buffered; 0
    /// indicates the end of the source.
    fn fill(&mut self) -> io::Result<usize> {
        if self.pos < self.end {
            return Ok(self.end - self.pos);
        }

        self.base += self.end as u64;
        self.pos = 0;
        self.end = 0;

        loop {
            match self.inner.read(&mut self.buf) {
                Ok(count) => {
                    self.end = count;
                    return Ok(count);
                }
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => (),
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: io::Read> ReadBytes for ReadStream<R> {
    #[inline]
    fn read_byte(&mut self) -> io::Result<u8> {
        if self.fill()? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"));
        }

        self.pos += 1;
        Ok(self.buf[self.pos - 1])
    }

    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]> {
        let mut bytes = [0u8; 2];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_triple_bytes(&mut self) -> io::Result<[u8; 3]> {
        let mut bytes = [0u8; 3];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]> {
        let mut bytes = [0u8; 4];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fill()? == 0 {
            return Ok(0);
        }

        let len = cmp::min(self.end - self.pos, buf.len());
        buf[..len].copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;

        Ok(len)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut total = 0;

        while total < buf.len() {
            let count = self.read_buf(&mut buf[total..])?;
            if count == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"));
            }
            total += count;
        }

        Ok(())
    }

    fn ignore_bytes(&mut self, count: u64) -> io::Result<()> {
        let mut remaining = count;

        while remaining > 0 {
            let buffered = self.fill()?;
            if buffered == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"));
            }

            let skip = cmp::min(buffered as u64, remaining);
            self.pos += skip as usize;
            remaining -= skip;
        }

        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.base + self.pos as u64
    }
}
