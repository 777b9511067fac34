//! Record Codec: pass kedua (packing pass)
//!
//! Encode langsung ke buffer yang ukurannya sudah dihitung persis oleh
//! planner. Tidak ada realloc dan tidak ada overflow check per write.

use tracing::debug;

use super::field::{parse_digits, TokenLayout};
use super::planner::{plan, Layout};
use super::record::{header_offset, RecordHeader, HEADER_SIZE};
use crate::error::{Error, FormatErrorKind, Result};

const NEWLINE: u8 = b'\n';
const COMMA: u8 = b',';

/// Hasil packing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeSummary {
    pub records: usize,
    pub bytes_written: usize,
    pub name_bytes: usize,
}

/// Encode semua record di `layout` ke `out` dengan token layout default.
///
/// `out.len()` harus sama dengan `layout.total_size()`.
pub fn encode(input: &[u8], layout: &Layout, out: &mut [u8]) -> Result<EncodeSummary> {
    encode_with(&TokenLayout::default(), input, layout, out)
}

/// Packing pass dengan sub-field table eksplisit.
///
/// Gagal di record pertama yang malformed; isi `out` setelah error tidak
/// boleh dipakai.
pub fn encode_with(
    token: &TokenLayout,
    input: &[u8],
    layout: &Layout,
    out: &mut [u8],
) -> Result<EncodeSummary> {
    if out.len() != layout.total_size() {
        return Err(Error::bounds(0, layout.total_size(), out.len()));
    }

    let min_token = token.min_token_len();
    let mut name_offset = 0usize;

    for (index, entry) in layout.iter().enumerate() {
        let start = entry.start_offset;
        let comma = find_comma(input, start, token.max_token_len)
            .map_err(|kind| Error::format(index, start, kind))?;

        let token_len = comma - start;
        if token_len < min_token {
            return Err(Error::format(
                index,
                start,
                FormatErrorKind::TokenTooShort {
                    len: token_len,
                    min: min_token,
                },
            ));
        }

        let (age_start, age_end) = token.age.range(start);
        let age = parse_digits(input, age_start, age_end).map_err(in_record(index))?;
        let age = u16::try_from(age)
            .map_err(|_| Error::format(index, age_start, FormatErrorKind::NumericOverflow))?;

        let (mobile_start, mobile_end) = token.mobile.range(start);
        let mobile = parse_digits(input, mobile_start, mobile_end).map_err(in_record(index))?;

        let name_start = comma + 1;
        let name_end = input[name_start..]
            .iter()
            .position(|&b| b == NEWLINE)
            .map_or(input.len(), |p| name_start + p);
        let name = &input[name_start..name_end];

        if name.len() != entry.name_len {
            return Err(Error::format(
                index,
                name_start,
                FormatErrorKind::LayoutMismatch {
                    planned: entry.name_len,
                    found: name.len(),
                },
            ));
        }
        let name_len = u16::try_from(name.len()).map_err(|_| {
            Error::format(
                index,
                name_start,
                FormatErrorKind::NameTooLong { len: name.len() },
            )
        })?;

        let at = header_offset(index, name_offset);
        let record_end = at + HEADER_SIZE + name.len();
        if record_end > out.len() {
            return Err(Error::bounds(at, HEADER_SIZE + name.len(), out.len() - at));
        }

        RecordHeader::new(mobile, age, name_len).write_to(&mut out[at..at + HEADER_SIZE]);
        out[at + HEADER_SIZE..record_end].copy_from_slice(name);

        name_offset += name.len();
    }

    let bytes_written = header_offset(layout.len(), name_offset);
    if bytes_written != out.len() {
        return Err(Error::bounds(bytes_written, out.len(), bytes_written));
    }

    debug!(records = layout.len(), bytes_written, "records packed");

    Ok(EncodeSummary {
        records: layout.len(),
        bytes_written,
        name_bytes: name_offset,
    })
}

/// Bounded scan untuk koma pertama mulai dari `start`.
///
/// Berhenti di newline, di akhir input, atau setelah `max_token_len` bytes.
#[inline(always)]
fn find_comma(
    input: &[u8],
    start: usize,
    max_token_len: usize,
) -> std::result::Result<usize, FormatErrorKind> {
    let window_end = start
        .saturating_add(max_token_len)
        .saturating_add(1)
        .min(input.len());
    let window = input.get(start..window_end).unwrap_or(&[]);

    for (i, &b) in window.iter().enumerate() {
        match b {
            COMMA => return Ok(start + i),
            NEWLINE => return Err(FormatErrorKind::MissingDelimiter { scanned: i }),
            _ => {}
        }
    }
    Err(FormatErrorKind::MissingDelimiter {
        scanned: window.len(),
    })
}

/// Re-tag field errors dengan index record.
fn in_record(index: usize) -> impl Fn(Error) -> Error {
    move |err| match err {
        Error::Format { offset, kind, .. } => Error::format(index, offset, kind),
        other => other,
    }
}

/// Encoder dengan buffer yang bisa di-reuse antar batch.
///
/// Buffer hanya tumbuh; batch berikutnya yang lebih kecil tidak realloc.
pub struct RecordEncoder {
    token: TokenLayout,
    buffer: Vec<u8>,
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new(TokenLayout::default())
    }
}

impl RecordEncoder {
    pub fn new(token: TokenLayout) -> Self {
        Self::with_capacity(token, 0)
    }

    /// Membuat encoder dengan buffer pre-allocated
    pub fn with_capacity(token: TokenLayout, capacity: usize) -> Self {
        Self {
            token,
            buffer: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub fn token_layout(&self) -> &TokenLayout {
        &self.token
    }

    /// Plan + pack `input` ke buffer internal.
    ///
    /// Kalau gagal, buffer dikosongkan supaya tidak ada hasil parsial.
    pub fn encode(&mut self, input: &[u8]) -> Result<EncodeSummary> {
        let layout = plan(input);
        self.encode_planned(input, &layout)
    }

    /// Pack dengan layout yang sudah dihitung.
    pub fn encode_planned(&mut self, input: &[u8], layout: &Layout) -> Result<EncodeSummary> {
        self.buffer.clear();
        self.buffer.resize(layout.total_size(), 0);

        match encode_with(&self.token, input, layout, &mut self.buffer) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Reset encoder untuk reuse
    #[inline(always)]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Get current buffer content
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}
