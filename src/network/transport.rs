//! Transport context
//!
//! State transport dimiliki secara eksplisit oleh `TransportContext`, bukan
//! global. Semua listener dan connection dibuat lewat context supaya socket
//! options konsisten.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use super::connection::Connection;
use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// Owned transport state. `init` sekali, `shutdown` sekali.
#[derive(Debug)]
pub struct TransportContext {
    config: TransportConfig,
}

impl TransportContext {
    pub fn init(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        info!(
            queue_depth = config.queue_depth,
            backlog = config.backlog,
            "transport initialized"
        );
        Ok(Self { config })
    }

    #[inline(always)]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    #[inline(always)]
    pub fn queue_depth(&self) -> usize {
        self.config.queue_depth
    }

    /// Bind + listen dengan backlog eksplisit.
    pub fn listen(&self, addr: SocketAddr, backlog: i32) -> Result<Listener> {
        let inner = bind_listener(addr, backlog).map_err(|e| Error::transport("listen", e))?;
        let local = inner
            .local_addr()
            .map_err(|e| Error::transport("listen", e))?;
        info!(addr = %local, backlog, "listening");

        Ok(Listener {
            inner,
            config: self.config.clone(),
        })
    }

    /// Connect ke `destination`.
    pub fn connect(&self, destination: SocketAddr) -> Result<Connection> {
        let stream = match self.config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&destination, timeout),
            None => TcpStream::connect(destination),
        }
        .map_err(|e| Error::transport("connect", e))?;

        debug!(peer = %destination, "connected");
        Connection::new(stream, &self.config)
    }

    /// Connect, kirim seluruh buffer, lalu tutup.
    ///
    /// Panjang buffer tidak di-frame; receiver tahu batch selesai saat
    /// koneksi ditutup.
    pub fn send(&self, destination: SocketAddr, buffer: &[u8]) -> Result<usize> {
        let mut conn = self.connect(destination)?;
        let sent = conn.send_all(buffer)?;
        conn.close();

        info!(peer = %destination, bytes = sent, "buffer sent");
        Ok(sent)
    }

    pub fn shutdown(self) {
        info!("transport shut down");
    }
}

/// Listening socket.
pub struct Listener {
    pub(crate) inner: TcpListener,
    pub(crate) config: TransportConfig,
}

impl Listener {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner
            .local_addr()
            .map_err(|e| Error::transport("local_addr", e))
    }

    /// Blocking accept.
    pub fn accept(&self) -> Result<Connection> {
        loop {
            match self.inner.accept() {
                Ok((stream, _)) => return Connection::new(stream, &self.config),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::transport("accept", e)),
            }
        }
    }
}

/// IPv4 lewat libc supaya backlog bisa diatur; SO_REUSEADDR di-set.
#[cfg(unix)]
fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    use std::os::unix::io::FromRawFd;

    let v4 = match addr {
        SocketAddr::V4(v4) => v4,
        // std::net::TcpListener memakai backlog 128
        SocketAddr::V6(_) => return TcpListener::bind(addr),
    };

    // SAFETY: fd langsung dibungkus TcpListener, jadi di-close saat error
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let listener = TcpListener::from_raw_fd(fd);

        let opt: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) < 0
        {
            return Err(io::Error::last_os_error());
        }

        let mut sin: libc::sockaddr_in = std::mem::zeroed();
        sin.sin_family = libc::AF_INET as libc::sa_family_t;
        sin.sin_port = v4.port().to_be();
        sin.sin_addr = libc::in_addr {
            s_addr: u32::from_ne_bytes(v4.ip().octets()),
        };

        if libc::bind(
            fd,
            &sin as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        ) < 0
        {
            return Err(io::Error::last_os_error());
        }

        if libc::listen(fd, backlog) < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(listener)
    }
}

#[cfg(not(unix))]
fn bind_listener(addr: SocketAddr, _backlog: i32) -> io::Result<TcpListener> {
    TcpListener::bind(addr)
}
