//! Protocol Layer: Two-Pass Record Codec
//!
//! Prinsip desain:
//! - Sizing pass dulu: ukuran output dihitung persis sebelum menulis
//! - Fixed-size headers: 13 bytes, little-endian
//! - No per-record allocation: encode/decode langsung ke/dari satu buffer

mod decoder;
mod encoder;
mod field;
mod planner;
mod record;

pub use decoder::{decode, RecordReader, Records};
pub use encoder::{encode, encode_with, EncodeSummary, RecordEncoder};
pub use field::{parse_digits, parse_unsigned, FieldSpec, TokenLayout};
pub use planner::{plan, Layout, LayoutEntry};
pub use record::{header_offset, OwnedRecord, Record, RecordHeader, HEADER_SIZE};
