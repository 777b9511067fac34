//! Core module: Zero-Copy Input
//!
//! Prinsip desain:
//! - Zero-Copy: Input file di-mmap, planner membaca langsung dari page cache
//! - Immutable: Input tidak berubah selama kedua pass berjalan

mod input;

pub use input::Input;
