//! Sink server: accept loop + satu thread per connection
//!
//! Accept loop memakai mio (epoll/kqueue/IOCP) dengan poll timeout pendek
//! supaya `ShutdownHandle` bisa menghentikannya. Setiap connection punya
//! buffer sendiri dan thread sendiri; tidak ada state yang di-share selain
//! counters atomik.
//!
//! Error di satu connection (transport, format, bounds) hanya di-log dan
//! tidak menghentikan accept loop.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mio::net::TcpListener as MioTcpListener;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::transport::TransportContext;
use crate::config::{SinkConfig, TransportConfig};
use crate::error::{Error, Result};
use crate::protocol::{decode, Record};

const SERVER_TOKEN: Token = Token(0);

/// Satu batch yang diterima lengkap dari satu connection.
#[derive(Debug)]
pub struct Batch<'a> {
    pub peer: SocketAddr,
    pub bytes_received: usize,
    pub records: &'a [Record<'a>],
}

/// Sink statistics
#[derive(Debug, Default)]
pub struct SinkStats {
    connections_total: AtomicU64,
    batches_ok: AtomicU64,
    batches_failed: AtomicU64,
    records: AtomicU64,
    bytes_received: AtomicU64,
}

/// Point-in-time copy dari `SinkStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_total: u64,
    pub batches_ok: u64,
    pub batches_failed: u64,
    pub records: u64,
    pub bytes_received: u64,
}

impl SinkStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            batches_ok: self.batches_ok.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Menghentikan `Sink::run` dari thread lain.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Receiving side dari transfer boundary.
pub struct Sink {
    poll: Poll,
    listener: MioTcpListener,
    local_addr: SocketAddr,
    config: SinkConfig,
    transport: TransportConfig,
    events_capacity: usize,
    shutdown: ShutdownHandle,
    stats: Arc<SinkStats>,
    next_id: u64,
    accept_backlogged: bool,
}

/// Hasil satu putaran accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptState {
    /// Antrian listener kosong (WouldBlock).
    Drained,
    /// Accept gagal sebelum antrian kosong.
    Backlogged,
}

impl Sink {
    pub fn bind(ctx: &TransportContext, config: SinkConfig) -> Result<Self> {
        config.validate()?;

        let listener = ctx.listen(config.bind, ctx.config().backlog)?;
        let local_addr = listener.local_addr()?;
        listener
            .inner
            .set_nonblocking(true)
            .map_err(|e| Error::transport("listen", e))?;

        let poll = Poll::new().map_err(|e| Error::transport("poll", e))?;
        let mut mio_listener = MioTcpListener::from_std(listener.inner);
        poll.registry()
            .register(&mut mio_listener, SERVER_TOKEN, Interest::READABLE)
            .map_err(|e| Error::transport("poll", e))?;

        Ok(Self {
            poll,
            listener: mio_listener,
            local_addr,
            config,
            transport: listener.config,
            events_capacity: ctx.queue_depth(),
            shutdown: ShutdownHandle(Arc::new(AtomicBool::new(false))),
            stats: Arc::new(SinkStats::default()),
            next_id: 0,
            accept_backlogged: false,
        })
    }

    #[inline(always)]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> Arc<SinkStats> {
        Arc::clone(&self.stats)
    }

    /// Run accept loop sampai shutdown.
    ///
    /// `handler` dipanggil dari thread connection untuk setiap batch yang
    /// ter-decode lengkap. Saat shutdown, thread connection yang masih jalan
    /// di-join dulu.
    pub fn run<F>(mut self, handler: F) -> Result<StatsSnapshot>
    where
        F: Fn(&Batch<'_>) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let mut events = Events::with_capacity(self.events_capacity);
        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut failure = None;

        info!(addr = %self.local_addr, "sink accepting connections");

        while !self.shutdown.is_shutdown() {
            match self
                .poll
                .poll(&mut events, Some(self.config.poll_interval()))
            {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    failure = Some(Error::transport("poll", e));
                    break;
                }
            }

            // Edge-triggered: kalau accept terakhir gagal, antrian belum
            // kosong dan tidak akan ada event baru untuknya.
            let readable = events.iter().any(|e| e.token() == SERVER_TOKEN);
            if readable || self.accept_backlogged {
                self.accept_backlogged =
                    self.accept_connections(&handler, &mut workers) == AcceptState::Backlogged;
            }

            workers.retain(|w| !w.is_finished());
        }

        debug!(pending = workers.len(), "sink stopping, joining workers");
        join_workers(workers);

        if let Some(err) = failure {
            error!(error = %err, "sink stopped on poll failure");
            return Err(err);
        }

        let snapshot = self.stats.snapshot();
        info!(
            connections = snapshot.connections_total,
            batches_ok = snapshot.batches_ok,
            batches_failed = snapshot.batches_failed,
            records = snapshot.records,
            "sink stopped"
        );
        Ok(snapshot)
    }

    /// Accept semua connection yang pending.
    fn accept_connections<F>(
        &mut self,
        handler: &Arc<F>,
        workers: &mut Vec<JoinHandle<()>>,
    ) -> AcceptState
    where
        F: Fn(&Batch<'_>) + Send + Sync + 'static,
    {
        loop {
            let (stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return AcceptState::Drained,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Misal EMFILE: coba lagi di poll tick berikutnya
                    warn!(error = %e, "accept failed, retrying next tick");
                    return AcceptState::Backlogged;
                }
            };

            let id = self.next_id;
            self.next_id += 1;
            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
            info!(id, peer = %addr, "connection accepted");

            let stream = into_std(stream);
            let worker = ConnectionWorker {
                id,
                peer: addr,
                transport: self.transport.clone(),
                config: self.config.clone(),
                stats: Arc::clone(&self.stats),
            };
            let handler = Arc::clone(handler);

            let spawned = thread::Builder::new()
                .name(format!("packline-conn-{}", id))
                .spawn(move || worker.run(stream, handler.as_ref()));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!(id, error = %e, "failed to spawn connection worker"),
            }
        }
    }
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        if worker.join().is_err() {
            error!("connection worker panicked");
        }
    }
}

/// State milik satu thread connection.
struct ConnectionWorker {
    id: u64,
    peer: SocketAddr,
    transport: TransportConfig,
    config: SinkConfig,
    stats: Arc<SinkStats>,
}

impl ConnectionWorker {
    fn run<F>(self, stream: TcpStream, handler: &F)
    where
        F: Fn(&Batch<'_>),
    {
        match self.serve(stream, handler) {
            Ok((bytes, records)) => {
                self.stats.batches_ok.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .records
                    .fetch_add(records as u64, Ordering::Relaxed);
                info!(id = self.id, peer = %self.peer, bytes, records, "batch decoded");
            }
            Err(e) => {
                self.stats.batches_failed.fetch_add(1, Ordering::Relaxed);
                warn!(id = self.id, peer = %self.peer, error = %e, "batch dropped");
            }
        }
    }

    fn serve<F>(&self, stream: TcpStream, handler: &F) -> Result<(usize, usize)>
    where
        F: Fn(&Batch<'_>),
    {
        let mut conn = Connection::new(stream, &self.transport)?;
        conn.set_read_timeout(self.config.read_timeout())?;

        let mut buffer = vec![0u8; self.config.buffer_size];
        let received = conn.receive_to_end(&mut buffer);
        conn.close();
        let received = received?;

        self.stats
            .bytes_received
            .fetch_add(received as u64, Ordering::Relaxed);
        debug!(id = self.id, bytes = received, "received");

        let records = decode(&buffer[..received]).read_all()?;
        handler(&Batch {
            peer: self.peer,
            bytes_received: received,
            records: &records,
        });

        Ok((received, records.len()))
    }
}

/// Pindahkan ownership socket dari mio ke std (blocking mode di-set oleh Connection).
#[cfg(unix)]
fn into_std(stream: mio::net::TcpStream) -> TcpStream {
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    // SAFETY: fd dilepas dari mio stream, jadi hanya dimiliki TcpStream baru
    unsafe { TcpStream::from_raw_fd(stream.into_raw_fd()) }
}

#[cfg(windows)]
fn into_std(stream: mio::net::TcpStream) -> TcpStream {
    use std::os::windows::io::{FromRawSocket, IntoRawSocket};
    // SAFETY: socket dilepas dari mio stream, jadi hanya dimiliki TcpStream baru
    unsafe { TcpStream::from_raw_socket(stream.into_raw_socket()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::protocol::RecordEncoder;

    fn test_sink() -> (Sink, TransportContext) {
        let ctx = TransportContext::init(TransportConfig::default()).unwrap();
        let config = SinkConfig::default()
            .with_bind("127.0.0.1:0".parse().unwrap())
            .with_buffer_size(64 * 1024)
            .with_read_timeout(Some(Duration::from_secs(5)));
        let sink = Sink::bind(&ctx, config).unwrap();
        (sink, ctx)
    }

    #[test]
    fn test_sink_decodes_batch() {
        let (sink, ctx) = test_sink();
        let addr = sink.local_addr();
        let shutdown = sink.shutdown_handle();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = Arc::clone(&received);
        let server = thread::spawn(move || {
            sink.run(move |batch| {
                let mut out = sink_received.lock().unwrap();
                out.extend(batch.records.iter().map(|r| r.into_owned()));
            })
        });

        let mut encoder = RecordEncoder::default();
        encoder
            .encode(b"h\nA12B1234567890,alice\nA34B0987654321,bob\n")
            .unwrap();
        ctx.send(addr, encoder.as_bytes()).unwrap();

        // Tunggu sampai worker selesai
        for _ in 0..200 {
            if received.lock().unwrap().len() == 2 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        shutdown.shutdown();
        let stats = server.join().unwrap().unwrap();

        let records = received.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, b"alice");
        assert_eq!(records[1].mobile, 987654321);
        assert_eq!(stats.batches_ok, 1);
        assert_eq!(stats.records, 2);
    }

    #[test]
    fn test_backlogged_accept_retried_without_new_event() {
        let (mut sink, _ctx) = test_sink();
        let stats = sink.stats();
        let shutdown = sink.shutdown_handle();

        // Connection masuk antrian, lalu event readiness-nya dihabiskan
        drop(TcpStream::connect(sink.local_addr()).unwrap());
        let mut events = Events::with_capacity(8);
        sink.poll
            .poll(&mut events, Some(Duration::from_secs(2)))
            .unwrap();
        assert!(events.iter().any(|e| e.token() == SERVER_TOKEN));

        // Seolah accept sebelumnya gagal dengan EMFILE
        sink.accept_backlogged = true;
        let server = thread::spawn(move || sink.run(|_| {}));

        for _ in 0..200 {
            if stats.snapshot().batches_ok == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        shutdown.shutdown();
        let snapshot = server.join().unwrap().unwrap();
        assert_eq!(snapshot.connections_total, 1);
        assert_eq!(snapshot.batches_ok, 1);
    }

    #[test]
    fn test_join_workers_waits_and_survives_panic() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let slow = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::Release);
        });
        let panicked = thread::spawn(|| panic!("worker failure"));

        join_workers(vec![slow, panicked]);
        assert!(done.load(Ordering::Acquire));
    }

    #[test]
    fn test_sink_stops_without_connections() {
        let (sink, _ctx) = test_sink();
        let shutdown = sink.shutdown_handle();
        shutdown.shutdown();

        let stats = sink.run(|_| {}).unwrap();
        assert_eq!(stats, StatsSnapshot::default());
    }
}
