// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Toccata.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading the underlying byte source.
    IoError(io::Error),
    /// The stream contained malformed data and could not be decoded.
    DecodeError(&'static str),
    /// An unsupported container or field feature was encountered.
    Unsupported(&'static str),
    /// A numeric decode exceeded the width of its destination type.
    Overflow(&'static str),
    /// An illegal `0xFF, >= 0xE0` byte pair was found in unsynchronised data.
    InvalidUnsynchronization,
    /// A default or user-defined limit was reached while parsing the stream. Limits are used to
    /// prevent denial-of-service attacks from malicious streams.
    LimitError(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(ref err) => write!(f, "io error: {}", err),
            Error::DecodeError(msg) => write!(f, "malformed stream: {}", msg),
            Error::Unsupported(feature) => write!(f, "unsupported feature: {}", feature),
            Error::Overflow(msg) => write!(f, "numeric overflow: {}", msg),
            Error::InvalidUnsynchronization => write!(f, "invalid unsynchronised data"),
            Error::LimitError(constraint) => write!(f, "limit reached: {}", constraint),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create an overflow error.
pub fn overflow_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::Overflow(desc))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}
