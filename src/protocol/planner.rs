//! Layout Planner: pass pertama (sizing pass)
//!
//! Satu scan kiri-ke-kanan atas raw bytes. Hasilnya offset awal setiap
//! record, panjang name-nya, dan ukuran total output buffer. Tidak ada
//! alokasi per record selain list entries.

use tracing::debug;

use super::record::{header_offset, HEADER_SIZE};

const NEWLINE: u8 = b'\n';
const COMMA: u8 = b',';

/// Satu entry per record input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    /// Absolute offset of the record's first byte in the planned input.
    pub start_offset: usize,
    /// Bytes after the first comma, up to the newline.
    pub name_len: usize,
}

/// Output dari sizing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    entries: Vec<LayoutEntry>,
    total_size: usize,
}

impl Layout {
    /// Exact byte size of the packed output.
    #[inline(always)]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LayoutEntry> {
        self.entries.iter()
    }

    /// Cumulative name-bytes offset untuk setiap record index.
    ///
    /// Sequence ini yang harus di-replay persis oleh reader.
    pub fn name_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().scan(0usize, |acc, entry| {
            let current = *acc;
            *acc += entry.name_len;
            Some(current)
        })
    }

    /// Offset header record ke-`index` di output buffer.
    pub fn header_offset(&self, index: usize) -> Option<usize> {
        if index >= self.entries.len() {
            return None;
        }
        let names: usize = self.entries[..index].iter().map(|e| e.name_len).sum();
        Some(header_offset(index, names))
    }
}

impl<'a> IntoIterator for &'a Layout {
    type Item = &'a LayoutEntry;
    type IntoIter = std::slice::Iter<'a, LayoutEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Sizing pass.
///
/// Baris pertama adalah header dan di-skip. Kalau tidak ada newline sama
/// sekali, hasilnya layout kosong (bukan error). Baris terakhir tanpa
/// newline bukan record.
pub fn plan(input: &[u8]) -> Layout {
    let first_newline = match input.iter().position(|&b| b == NEWLINE) {
        Some(pos) => pos,
        None => {
            debug!(input_len = input.len(), "no header newline, empty layout");
            return Layout::default();
        }
    };

    let mut entries = Vec::new();
    let mut total_size = 0usize;

    let mut record_start = first_newline + 1;
    let mut name_len = 0usize;
    let mut seen_comma = false;

    for (i, &b) in input.iter().enumerate().skip(record_start) {
        match b {
            NEWLINE => {
                entries.push(LayoutEntry {
                    start_offset: record_start,
                    name_len,
                });
                total_size += HEADER_SIZE + name_len;

                record_start = i + 1;
                name_len = 0;
                seen_comma = false;
            }
            COMMA if !seen_comma => seen_comma = true,
            _ => {
                if seen_comma {
                    name_len += 1;
                }
            }
        }
    }

    debug!(
        records = entries.len(),
        total_size,
        trailing = input.len() - record_start,
        "layout planned"
    );

    Layout {
        entries,
        total_size,
    }
}
