//! Error types untuk codec dan transport.
//!
//! Format dan bounds errors membatalkan seluruh batch: offset yang sudah
//! bergeser membuat semua record sesudahnya invalid. Transport errors hanya
//! berlaku untuk satu connection.

use std::io;

use thiserror::Error;

/// Why a record failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatErrorKind {
    /// No comma within the token window of the record.
    #[error("no ',' found within {scanned} bytes")]
    MissingDelimiter { scanned: usize },
    /// Token is shorter than the sub-field table requires.
    #[error("token is {len} bytes, need at least {min}")]
    TokenTooShort { len: usize, min: usize },
    /// Non-digit byte inside a numeric sub-field.
    #[error("invalid digit 0x{byte:02x}")]
    InvalidDigit { byte: u8 },
    /// Numeric text does not fit the target integer.
    #[error("numeric field overflows its type")]
    NumericOverflow,
    /// Name does not fit the 16-bit length field.
    #[error("name is {len} bytes, max {max}", max = u16::MAX)]
    NameTooLong { len: usize },
    /// Name length in the input differs from the planned layout.
    #[error("planned name length {planned} but input has {found}")]
    LayoutMismatch { planned: usize, found: usize },
}

/// Errors produced by packline.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed record text.
    #[error("format error in record {record} at byte {offset}: {kind}")]
    Format {
        record: usize,
        offset: usize,
        kind: FormatErrorKind,
    },

    /// Read or write outside an allocated buffer.
    #[error("out of bounds at byte {offset}: need {needed} bytes, {available} available")]
    Bounds {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Connection failure or short/negative transfer result.
    #[error("transport {op} failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O outside the transport (input files, config files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn format(record: usize, offset: usize, kind: FormatErrorKind) -> Self {
        Self::Format {
            record,
            offset,
            kind,
        }
    }

    pub(crate) fn bounds(offset: usize, needed: usize, available: usize) -> Self {
        Self::Bounds {
            offset,
            needed,
            available,
        }
    }

    pub(crate) fn transport(op: &'static str, source: io::Error) -> Self {
        Self::Transport { op, source }
    }

    #[inline]
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    #[inline]
    pub fn is_bounds(&self) -> bool {
        matches!(self, Self::Bounds { .. })
    }

    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Result type for packline operations.
pub type Result<T> = std::result::Result<T, Error>;
