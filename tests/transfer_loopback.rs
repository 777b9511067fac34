//! Transfer Loopback - source dan sink di proses yang sama
//!
//! Usage:
//!   cargo test --test transfer_loopback -- --nocapture

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use packline::config::{SinkConfig, TransportConfig};
use packline::network::{ShutdownHandle, Sink, StatsSnapshot, TransportContext};
use packline::protocol::{decode, OwnedRecord, RecordEncoder};
use packline::Result;

type Received = Arc<Mutex<Vec<Vec<OwnedRecord>>>>;

struct Harness {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    received: Received,
    server: JoinHandle<Result<StatsSnapshot>>,
}

fn start_sink(ctx: &TransportContext) -> Harness {
    let config = SinkConfig::default()
        .with_bind("127.0.0.1:0".parse().unwrap())
        .with_buffer_size(1024 * 1024)
        .with_read_timeout(Some(Duration::from_secs(5)));
    let sink = Sink::bind(ctx, config).unwrap();

    let addr = sink.local_addr();
    let shutdown = sink.shutdown_handle();
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let batches = Arc::clone(&received);
    let server = thread::spawn(move || {
        sink.run(move |batch| {
            let records = batch.records.iter().map(|r| r.into_owned()).collect();
            batches.lock().unwrap().push(records);
        })
    });

    Harness {
        addr,
        shutdown,
        received,
        server,
    }
}

/// Tunggu sampai sink selesai memproses `batches` batch (ok atau gagal).
fn wait_for(harness: &Harness, stats: impl Fn() -> StatsSnapshot, batches: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        let s = stats();
        if s.batches_ok + s.batches_failed >= batches {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    harness.shutdown.shutdown();
    panic!("sink did not finish {} batches in time", batches);
}

fn sample_input(records: usize) -> Vec<u8> {
    let mut input = b"token,name\n".to_vec();
    for i in 0..records {
        writeln!(input, "T{:02}-{:010},person {}", i % 90, 5_550_000_000 + i as u64, i).unwrap();
    }
    input
}

#[test]
fn test_loopback_transfer_preserves_records() {
    let ctx = TransportContext::init(TransportConfig::default()).unwrap();
    let harness = start_sink(&ctx);

    let input = sample_input(500);
    let mut encoder = RecordEncoder::default();
    encoder.encode(&input).unwrap();
    let expected: Vec<OwnedRecord> = decode(encoder.as_bytes())
        .read_all()
        .unwrap()
        .into_iter()
        .map(|r| r.into_owned())
        .collect();

    let sent = ctx.send(harness.addr, encoder.as_bytes()).unwrap();
    assert_eq!(sent, encoder.as_bytes().len());

    let received = Arc::clone(&harness.received);
    let deadline = Instant::now() + Duration::from_secs(10);
    while received.lock().unwrap().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    harness.shutdown.shutdown();
    let stats = harness.server.join().unwrap().unwrap();

    let batches = received.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], expected);
    assert_eq!(batches[0][499].mobile, 5_550_000_499);
    assert_eq!(batches[0][7].name, b"person 7");
    assert_eq!(stats.batches_ok, 1);
    assert_eq!(stats.records, 500);
    assert_eq!(stats.bytes_received, sent as u64);

    ctx.shutdown();
}

#[test]
fn test_malformed_connection_does_not_stop_sink() {
    let ctx = TransportContext::init(TransportConfig::default()).unwrap();
    let config = SinkConfig::default()
        .with_bind("127.0.0.1:0".parse().unwrap())
        .with_read_timeout(Some(Duration::from_secs(5)));
    let sink = Sink::bind(&ctx, config).unwrap();
    let stats = sink.stats();
    let addr = sink.local_addr();
    let shutdown = sink.shutdown_handle();

    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let batches = Arc::clone(&received);
    let server = thread::spawn(move || {
        sink.run(move |batch| {
            batches
                .lock()
                .unwrap()
                .push(batch.records.iter().map(|r| r.into_owned()).collect());
        })
    });
    let harness = Harness {
        addr,
        shutdown,
        received,
        server,
    };

    // 5 bytes: lebih pendek dari satu header
    {
        let mut raw = TcpStream::connect(harness.addr).unwrap();
        raw.write_all(&[1, 2, 3, 4, 5]).unwrap();
    }
    wait_for(&harness, || stats.snapshot(), 1);

    let mut encoder = RecordEncoder::default();
    encoder.encode(&sample_input(3)).unwrap();
    ctx.send(harness.addr, encoder.as_bytes()).unwrap();
    wait_for(&harness, || stats.snapshot(), 2);

    harness.shutdown.shutdown();
    let final_stats = harness.server.join().unwrap().unwrap();

    assert_eq!(final_stats.connections_total, 2);
    assert_eq!(final_stats.batches_failed, 1);
    assert_eq!(final_stats.batches_ok, 1);
    assert_eq!(final_stats.records, 3);

    let batches = harness.received.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][2].name, b"person 2");
}

#[test]
fn test_empty_batch_is_accepted() {
    let ctx = TransportContext::init(TransportConfig::default()).unwrap();
    let harness = start_sink(&ctx);

    // Connect lalu tutup tanpa kirim apa pun: batch kosong yang valid
    drop(TcpStream::connect(harness.addr).unwrap());

    let received = Arc::clone(&harness.received);
    let deadline = Instant::now() + Duration::from_secs(10);
    while received.lock().unwrap().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    harness.shutdown.shutdown();
    let stats = harness.server.join().unwrap().unwrap();

    assert_eq!(stats.batches_ok, 1);
    assert_eq!(stats.records, 0);
    assert!(received.lock().unwrap()[0].is_empty());
}

#[test]
fn test_silent_peer_times_out_and_sink_keeps_serving() {
    let ctx = TransportContext::init(TransportConfig::default()).unwrap();
    let config = SinkConfig::default()
        .with_bind("127.0.0.1:0".parse().unwrap())
        .with_read_timeout(Some(Duration::from_millis(200)));
    let sink = Sink::bind(&ctx, config).unwrap();
    let stats = sink.stats();
    let addr = sink.local_addr();
    let shutdown = sink.shutdown_handle();

    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let batches = Arc::clone(&received);
    let server = thread::spawn(move || {
        sink.run(move |batch| {
            batches
                .lock()
                .unwrap()
                .push(batch.records.iter().map(|r| r.into_owned()).collect());
        })
    });
    let harness = Harness {
        addr,
        shutdown,
        received,
        server,
    };

    // Connect, tidak kirim apa-apa, dan tidak menutup koneksi
    let silent = TcpStream::connect(harness.addr).unwrap();
    wait_for(&harness, || stats.snapshot(), 1);

    let after_timeout = stats.snapshot();
    assert_eq!(after_timeout.batches_failed, 1);
    assert_eq!(after_timeout.batches_ok, 0);
    assert!(harness.received.lock().unwrap().is_empty());

    let mut encoder = RecordEncoder::default();
    encoder.encode(&sample_input(2)).unwrap();
    ctx.send(harness.addr, encoder.as_bytes()).unwrap();
    wait_for(&harness, || stats.snapshot(), 2);
    drop(silent);

    harness.shutdown.shutdown();
    let final_stats = harness.server.join().unwrap().unwrap();
    assert_eq!(final_stats.connections_total, 2);
    assert_eq!(final_stats.batches_failed, 1);
    assert_eq!(final_stats.batches_ok, 1);
    assert_eq!(final_stats.records, 2);
}
