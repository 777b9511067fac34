//! Tracing subscriber setup.
//!
//! `RUST_LOG` menang kalau di-set; kalau tidak, level ditentukan dari
//! jumlah `-v`.

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "packline=info",
        1 => "packline=debug",
        2 => "packline=trace",
        _ => "trace",
    }
}

/// Install global fmt subscriber. Hanya boleh dipanggil sekali per proses.
pub fn init(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize logging: {}", e)))
}
