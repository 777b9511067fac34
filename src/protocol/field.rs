//! Fixed-width numeric sub-fields di dalam token sebelum koma.
//!
//! Token layout (default):
//! ┌───┬────┬───┬────────────┬───────────┐
//! │ 0 │ 1-2│ 3 │    4-13    │  14..     │
//! │ - │ age│ - │   mobile   │ (ignored) │
//! └───┴────┴───┴────────────┴───────────┘
//!
//! Semua posisi dihitung dari awal token, bukan mundur dari koma.

use serde::Deserialize;

use crate::error::{Error, FormatErrorKind, Result};

/// Max decimal digits yang selalu muat di u16 / u64.
const MAX_U16_DIGITS: usize = 4;
const MAX_U64_DIGITS: usize = 19;

/// Parse `[start, end)` sebagai unsigned decimal.
///
/// Tidak ada validasi: byte non-digit menghasilkan nilai sampah dan
/// overflow di-wrap. Dipakai hanya kalau input sudah dipercaya.
#[inline(always)]
pub fn parse_unsigned(bytes: &[u8], start: usize, end: usize) -> u64 {
    let mut value: u64 = 0;
    for &b in &bytes[start..end] {
        value = value
            .wrapping_mul(10)
            .wrapping_add(b.wrapping_sub(b'0') as u64);
    }
    value
}

/// Checked variant of [`parse_unsigned`].
///
/// Errors carry `record = 0`; callers re-tag them with the record index.
#[inline]
pub fn parse_digits(bytes: &[u8], start: usize, end: usize) -> Result<u64> {
    let mut value: u64 = 0;
    for (i, &b) in bytes[start..end].iter().enumerate() {
        if !b.is_ascii_digit() {
            return Err(Error::format(
                0,
                start + i,
                FormatErrorKind::InvalidDigit { byte: b },
            ));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as u64))
            .ok_or_else(|| Error::format(0, start, FormatErrorKind::NumericOverflow))?;
    }
    Ok(value)
}

/// One fixed-width sub-field, relative to token start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub offset: usize,
    pub width: usize,
}

impl FieldSpec {
    pub const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    /// Exclusive end relative to token start.
    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    /// Absolute byte range for a token starting at `token_start`.
    #[inline(always)]
    pub fn range(&self, token_start: usize) -> (usize, usize) {
        (token_start + self.offset, token_start + self.end())
    }
}

/// Sub-field table for the token before the first comma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenLayout {
    pub age: FieldSpec,
    pub mobile: FieldSpec,
    /// Upper bound untuk scan koma; lebih dari ini dianggap FormatError.
    pub max_token_len: usize,
}

impl Default for TokenLayout {
    fn default() -> Self {
        Self {
            age: FieldSpec::new(1, 2),
            mobile: FieldSpec::new(4, 10),
            max_token_len: 64,
        }
    }
}

impl TokenLayout {
    /// Shortest token that still covers every sub-field.
    #[inline(always)]
    pub fn min_token_len(&self) -> usize {
        self.age.end().max(self.mobile.end())
    }

    pub fn with_max_token_len(mut self, max_token_len: usize) -> Self {
        self.max_token_len = max_token_len;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.age.width == 0 || self.mobile.width == 0 {
            return Err(Error::Config("sub-field width must be non-zero".into()));
        }
        if self.age.width > MAX_U16_DIGITS {
            return Err(Error::Config(format!(
                "age width {} exceeds {} digits",
                self.age.width, MAX_U16_DIGITS
            )));
        }
        if self.mobile.width > MAX_U64_DIGITS {
            return Err(Error::Config(format!(
                "mobile width {} exceeds {} digits",
                self.mobile.width, MAX_U64_DIGITS
            )));
        }
        if self.max_token_len < self.min_token_len() {
            return Err(Error::Config(format!(
                "max_token_len {} is shorter than the sub-field table ({})",
                self.max_token_len,
                self.min_token_len()
            )));
        }
        Ok(())
    }
}
