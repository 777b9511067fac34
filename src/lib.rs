//! Packline - Two-Pass Record Codec
//!
//! Arsitektur:
//! - Sizing pass: satu scan menghitung layout dan ukuran output persis
//! - Packing pass: 13-byte little-endian header + raw name, back-to-back
//! - Zero-Copy: input di-mmap, decoder meminjam name langsung dari buffer
//! - Transfer boundary: satu buffer utuh per TCP connection
//!
//! ```
//! use packline::protocol::{decode, plan, encode};
//!
//! let input = b"header\n0000123456789012345,name\n";
//! let layout = plan(input);
//! let mut out = vec![0u8; layout.total_size()];
//! encode(input, &layout, &mut out).unwrap();
//!
//! let records = decode(&out).read_all().unwrap();
//! assert_eq!(records[0].mobile, 1234567890);
//! assert_eq!(records[0].name, b"name");
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod network;
pub mod protocol;

pub use config::Config;
pub use error::{Error, FormatErrorKind, Result};
