//! Packed Record Format
//!
//! Layout:
//! ┌─────────────────────────────────────────────────────┐
//! │ RecordHeader (13 bytes, fixed, little-endian)       │
//! │   mobile u64 │ age u16 │ name_len u16 │ external u8 │
//! ├─────────────────────────────────────────────────────┤
//! │ Name (name_len bytes, raw)                          │
//! └─────────────────────────────────────────────────────┘
//!
//! Record ditulis back-to-back tanpa padding dan tanpa framing. Stride
//! berubah-ubah sesuai name_len, jadi posisi record ke-i hanya bisa dihitung
//! dari cumulative name bytes sebelumnya.

use std::borrow::Cow;

use crate::error::{Error, Result};

/// Ukuran header record dalam bytes.
pub const HEADER_SIZE: usize = 13;

const MOBILE_AT: usize = 0;
const AGE_AT: usize = 8;
const NAME_LEN_AT: usize = 10;
const EXTERNAL_AT: usize = 12;

/// Offset header record ke-`index` setelah `name_offset` name bytes.
#[inline(always)]
pub const fn header_offset(index: usize, name_offset: usize) -> usize {
    index * HEADER_SIZE + name_offset
}

/// Fixed 13-byte record header.
///
/// Ditulis dan dibaca field per field dengan `to_le_bytes`, jadi tidak
/// bergantung pada alignment atau endianness host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordHeader {
    pub mobile: u64,
    pub age: u16,
    pub name_len: u16,
    /// Reserved. Selalu ditulis `false`.
    pub external: bool,
}

impl RecordHeader {
    #[inline(always)]
    pub fn new(mobile: u64, age: u16, name_len: u16) -> Self {
        Self {
            mobile,
            age,
            name_len,
            external: false,
        }
    }

    /// Tulis header ke awal `dst`.
    ///
    /// `dst` minimal `HEADER_SIZE` bytes.
    #[inline(always)]
    pub fn write_to(&self, dst: &mut [u8]) {
        dst[MOBILE_AT..AGE_AT].copy_from_slice(&self.mobile.to_le_bytes());
        dst[AGE_AT..NAME_LEN_AT].copy_from_slice(&self.age.to_le_bytes());
        dst[NAME_LEN_AT..EXTERNAL_AT].copy_from_slice(&self.name_len.to_le_bytes());
        dst[EXTERNAL_AT] = self.external as u8;
    }

    /// Baca header dari `buf` pada `offset`.
    #[inline(always)]
    pub fn read_from(buf: &[u8], offset: usize) -> Result<Self> {
        let available = buf.len().saturating_sub(offset);
        if available < HEADER_SIZE {
            return Err(Error::bounds(offset, HEADER_SIZE, available));
        }
        let h = &buf[offset..offset + HEADER_SIZE];

        let mut mobile = [0u8; 8];
        mobile.copy_from_slice(&h[MOBILE_AT..AGE_AT]);

        Ok(Self {
            mobile: u64::from_le_bytes(mobile),
            age: u16::from_le_bytes([h[AGE_AT], h[AGE_AT + 1]]),
            name_len: u16::from_le_bytes([h[NAME_LEN_AT], h[NAME_LEN_AT + 1]]),
            external: h[EXTERNAL_AT] != 0,
        })
    }

    /// Total record size (header + name)
    #[inline(always)]
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.name_len as usize
    }
}

/// Decoded record, name di-borrow langsung dari buffer (zero-copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Position in the batch.
    pub index: usize,
    pub mobile: u64,
    pub age: u16,
    pub external: bool,
    pub name: &'a [u8],
    /// Cumulative name bytes before this record.
    pub name_offset: usize,
}

impl<'a> Record<'a> {
    pub fn name_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.name)
    }

    pub fn into_owned(self) -> OwnedRecord {
        OwnedRecord {
            mobile: self.mobile,
            age: self.age,
            external: self.external,
            name: self.name.to_vec(),
        }
    }
}

/// Record yang tidak terikat ke lifetime buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRecord {
    pub mobile: u64,
    pub age: u16,
    pub external: bool,
    pub name: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut buf = [0xffu8; HEADER_SIZE];
        RecordHeader::new(0x0102_0304_0506_0708, 0x0a0b, 4).write_to(&mut buf);

        assert_eq!(&buf[0..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&buf[8..10], &[0x0b, 0x0a]);
        assert_eq!(&buf[10..12], &[4, 0]);
        assert_eq!(buf[12], 0);
    }

    #[test]
    fn test_header_read_back() {
        let mut buf = vec![0u8; 3 + HEADER_SIZE];
        let header = RecordHeader::new(9876543210, 42, 7);
        header.write_to(&mut buf[3..]);

        let parsed = RecordHeader::read_from(&buf, 3).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.total_size(), 20);
    }

    #[test]
    fn test_short_header_is_bounds_error() {
        let buf = [0u8; HEADER_SIZE - 1];
        let err = RecordHeader::read_from(&buf, 0).unwrap_err();
        assert!(err.is_bounds());
    }

    #[test]
    fn test_header_offset() {
        assert_eq!(header_offset(0, 0), 0);
        assert_eq!(header_offset(2, 9), 35);
    }
}
