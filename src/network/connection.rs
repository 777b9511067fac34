//! Connection handling untuk bulk-buffer transfer
//!
//! Blocking I/O, satu buffer per call. `receive` dan `send` adalah satu
//! syscall (tanpa retry); varian `_all` / `_exact` / `_to_end` loop sampai
//! selesai.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// Blocking TCP connection ke satu peer.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Wrap TcpStream, set blocking mode dan socket options.
    pub(crate) fn new(stream: TcpStream, config: &TransportConfig) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map_err(|e| Error::transport("peer_addr", e))?;

        stream
            .set_nonblocking(false)
            .map_err(|e| Error::transport("configure", e))?;

        // Disable Nagle's algorithm untuk lower latency
        if config.nodelay {
            stream
                .set_nodelay(true)
                .map_err(|e| Error::transport("configure", e))?;
        }

        if let Some(size) = config.socket_buffer_size {
            set_socket_buffers(&stream, size);
        }

        Ok(Self { stream, peer })
    }

    #[inline(always)]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream
            .set_read_timeout(timeout)
            .map_err(|e| Error::transport("configure", e))
    }

    /// Satu read ke `buf`. `Ok(0)` berarti peer sudah menutup koneksi.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::transport("receive", e)),
            }
        }
    }

    /// Read sampai `buf` penuh. EOF sebelum penuh adalah error.
    pub fn receive_exact(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.receive(&mut buf[filled..])? {
                0 => {
                    return Err(Error::transport(
                        "receive",
                        io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("peer closed after {} of {} bytes", filled, buf.len()),
                        ),
                    ))
                }
                n => filled += n,
            }
        }
        Ok(filled)
    }

    /// Read sampai peer menutup koneksi.
    ///
    /// Kalau `buf` penuh dan peer masih mengirim, hasilnya BoundsError:
    /// batch tidak muat di buffer connection ini.
    pub fn receive_to_end(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.receive(&mut buf[filled..])? {
                0 => return Ok(filled),
                n => filled += n,
            }
        }

        let mut probe = [0u8; 1];
        match self.receive(&mut probe)? {
            0 => Ok(filled),
            _ => Err(Error::bounds(filled, filled + 1, buf.len())),
        }
    }

    /// Satu write. Bisa partial.
    pub fn send(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            match self.stream.write(buf) {
                Ok(0) if !buf.is_empty() => {
                    return Err(Error::transport(
                        "send",
                        io::Error::new(io::ErrorKind::WriteZero, "peer closed connection early"),
                    ))
                }
                Ok(n) => return Ok(n),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::transport("send", e)),
            }
        }
    }

    /// Write seluruh buffer, returns total bytes sent.
    pub fn send_all(&mut self, buf: &[u8]) -> Result<usize> {
        let mut sent = 0;
        while sent < buf.len() {
            sent += self.send(&buf[sent..])?;
        }
        self.stream
            .flush()
            .map_err(|e| Error::transport("send", e))?;
        Ok(sent)
    }

    /// Tutup koneksi (kedua arah).
    pub fn close(self) {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => debug!(peer = %self.peer, "connection closed"),
            Err(ref e) if e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => warn!(peer = %self.peer, error = %e, "shutdown failed"),
        }
    }
}

/// Set SO_SNDBUF / SO_RCVBUF. Gagal di-ignore: tidak semua platform support.
#[cfg(unix)]
fn set_socket_buffers(stream: &TcpStream, size: usize) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let optval: libc::c_int = size.min(libc::c_int::MAX as usize) as libc::c_int;

    for opt in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        // SAFETY: fd valid selama `stream` hidup; optval pointer ke c_int lokal
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                &optval as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret != 0 {
            debug!(
                opt,
                error = %io::Error::last_os_error(),
                "setsockopt ignored"
            );
        }
    }
}

#[cfg(not(unix))]
fn set_socket_buffers(_stream: &TcpStream, _size: usize) {}
