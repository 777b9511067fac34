//! Memory-Mapped Input untuk Zero-Copy Planning
//!
//! File CSV di-mmap read-only, jadi planner dan encoder bekerja langsung di
//! atas page cache tanpa copy ke heap. Selama `Input` hidup, isinya
//! dianggap immutable.

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// Byte stream input untuk codec.
pub struct Input {
    backing: Backing,
    path: Option<PathBuf>,
}

impl Input {
    /// Map file `path` read-only.
    ///
    /// File kosong tidak di-mmap (mmap dengan panjang 0 tidak portable).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let backing = if len == 0 {
            Backing::Owned(Vec::new())
        } else {
            // SAFETY: map read-only; file tidak dimodifikasi selama Input hidup
            // (concurrent mutation oleh proses lain adalah undefined behaviour).
            Backing::Mapped(unsafe { MmapOptions::new().map(&file)? })
        };

        debug!(path = %path.display(), len, "input mapped");

        Ok(Self {
            backing,
            path: Some(path.to_path_buf()),
        })
    }

    /// Input dari bytes yang sudah ada di memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            backing: Backing::Owned(bytes.into()),
            path: None,
        }
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(map) => &map[..],
            Backing::Owned(bytes) => &bytes[..],
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Header line (tanpa newline), kalau ada.
    pub fn header_line(&self) -> Option<&[u8]> {
        let bytes = self.as_bytes();
        bytes
            .iter()
            .position(|&b| b == b'\n')
            .map(|pos| &bytes[..pos])
    }
}

impl AsRef<[u8]> for Input {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
