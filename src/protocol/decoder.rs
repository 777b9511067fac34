//! Record Reader: kebalikan dari packing pass
//!
//! Zero-copy: name di-borrow langsung dari buffer. Reader hanya memegang
//! `&[u8]` immutable, jadi iterasi bisa diulang dari awal kapan saja.

use super::record::{header_offset, Record, RecordHeader, HEADER_SIZE};
use crate::error::{Error, Result};

/// Membuat reader untuk packed buffer
#[inline(always)]
pub fn decode(buffer: &[u8]) -> RecordReader<'_> {
    RecordReader::new(buffer)
}

/// Restartable view atas packed buffer.
#[derive(Debug, Clone, Copy)]
pub struct RecordReader<'a> {
    buffer: &'a [u8],
}

impl<'a> RecordReader<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Lazy iterator dari record pertama.
    #[inline(always)]
    pub fn iter(&self) -> Records<'a> {
        Records {
            buffer: self.buffer,
            index: 0,
            name_offset: 0,
            done: false,
        }
    }

    /// Decode seluruh buffer; gagal kalau ada satu record pun yang rusak.
    pub fn read_all(&self) -> Result<Vec<Record<'a>>> {
        self.iter().collect()
    }

    /// Jumlah record, memvalidasi seluruh buffer.
    pub fn count(&self) -> Result<usize> {
        self.iter().try_fold(0usize, |n, r| r.map(|_| n + 1))
    }

    #[inline(always)]
    pub fn len_bytes(&self) -> usize {
        self.buffer.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl<'a> IntoIterator for RecordReader<'a> {
    type Item = Result<Record<'a>>;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, 'r> IntoIterator for &'r RecordReader<'a> {
    type Item = Result<Record<'a>>;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator record.
///
/// Setelah error pertama iterator berhenti: offset sesudahnya tidak bisa
/// dipercaya lagi.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buffer: &'a [u8],
    index: usize,
    name_offset: usize,
    done: bool,
}

impl<'a> Records<'a> {
    /// Cumulative name bytes yang sudah dibaca.
    #[inline(always)]
    pub fn name_offset(&self) -> usize {
        self.name_offset
    }

    /// Remaining bytes
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer
            .len()
            .saturating_sub(header_offset(self.index, self.name_offset))
    }

    #[inline(always)]
    fn read_next(&mut self) -> Result<Record<'a>> {
        let at = header_offset(self.index, self.name_offset);
        let header = RecordHeader::read_from(self.buffer, at)?;

        let name_start = at + HEADER_SIZE;
        let name_end = name_start + header.name_len as usize;
        if name_end > self.buffer.len() {
            return Err(Error::bounds(
                name_start,
                header.name_len as usize,
                self.buffer.len() - name_start,
            ));
        }

        let record = Record {
            index: self.index,
            mobile: header.mobile,
            age: header.age,
            external: header.external,
            name: &self.buffer[name_start..name_end],
            name_offset: self.name_offset,
        };

        self.index += 1;
        self.name_offset += header.name_len as usize;

        Ok(record)
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining() == 0 {
            return None;
        }

        let item = self.read_next();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

impl std::iter::FusedIterator for Records<'_> {}
