//! Configuration
//!
//! Semua section optional di file TOML; yang tidak diisi pakai default.
//!
//! ```toml
//! [codec]
//! max_token_len = 64
//! age = { offset = 1, width = 2 }
//! mobile = { offset = 4, width = 10 }
//!
//! [transport]
//! queue_depth = 32
//! backlog = 128
//!
//! [sink]
//! bind = "0.0.0.0:22345"
//! buffer_size = 8388608
//!
//! [source]
//! destination = "127.0.0.1:22345"
//! ```

use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::protocol::TokenLayout;

pub const DEFAULT_PORT: u16 = 22345;
pub const DEFAULT_QUEUE_DEPTH: usize = 32;
pub const DEFAULT_BACKLOG: i32 = 128;
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8MB per connection
pub const DEFAULT_SOCKET_BUFFER: usize = 256 * 1024; // 256KB

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub codec: TokenLayout,
    pub transport: TransportConfig,
    pub sink: SinkConfig,
    pub source: SourceConfig,
}

impl Config {
    /// Load dari file TOML, lalu validasi.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.codec.validate()?;
        self.transport.validate()?;
        self.sink.validate()
    }
}

/// Transport context settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Kapasitas event queue untuk accept loop.
    pub queue_depth: usize,
    pub backlog: i32,
    /// TCP_NODELAY untuk low latency
    pub nodelay: bool,
    /// SO_SNDBUF / SO_RCVBUF. `None` = default OS.
    pub socket_buffer_size: Option<usize>,
    pub connect_timeout_ms: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            backlog: DEFAULT_BACKLOG,
            nodelay: true,
            socket_buffer_size: Some(DEFAULT_SOCKET_BUFFER),
            connect_timeout_ms: None,
        }
    }
}

impl TransportConfig {
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_socket_buffer_size(mut self, size: Option<usize>) -> Self {
        self.socket_buffer_size = size;
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 {
            return Err(Error::Config("transport.queue_depth must be > 0".into()));
        }
        if self.backlog <= 0 {
            return Err(Error::Config("transport.backlog must be > 0".into()));
        }
        if self.socket_buffer_size == Some(0) {
            return Err(Error::Config(
                "transport.socket_buffer_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Receiving side.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub bind: SocketAddr,
    /// Receive buffer per connection. Batch lebih besar dari ini ditolak.
    pub buffer_size: usize,
    /// `None` = block selamanya pada peer yang macet.
    pub read_timeout_ms: Option<u64>,
    /// Poll timeout accept loop; menentukan seberapa cepat shutdown terlihat.
    pub poll_interval_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_timeout_ms: None,
            poll_interval_ms: 100,
        }
    }
}

impl SinkConfig {
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.bind.set_port(port);
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config("sink.buffer_size must be > 0".into()));
        }
        if self.read_timeout_ms == Some(0) {
            return Err(Error::Config("sink.read_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Sending side.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub destination: SocketAddr,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            destination: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
        }
    }
}
