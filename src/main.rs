//! Packline CLI
//!
//! Usage:
//!   packline source --input people.csv --dest 127.0.0.1:22345
//!   packline sink --bind 0.0.0.0:22345
//!   packline bench --records 100000

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::info;

use packline::config::Config;
use packline::core::Input;
use packline::network::{Sink, TransportContext};
use packline::protocol::{decode, plan, RecordEncoder, TokenLayout};
use packline::{logging, Result};

/// Packline - CSV to packed binary records over TCP.
#[derive(Parser)]
#[command(name = "packline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a CSV file and send the packed buffer to a sink
    Source {
        /// Input CSV (first line is a header)
        #[arg(short, long)]
        input: PathBuf,

        /// Sink address
        #[arg(short, long)]
        dest: Option<SocketAddr>,

        /// Encode only, do not send
        #[arg(long)]
        dry_run: bool,
    },

    /// Receive packed buffers and decode them
    Sink {
        /// Bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Receive buffer per connection, in bytes
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Number of records to log per batch
        #[arg(long, default_value = "3")]
        preview: usize,
    },

    /// Time plan / encode / decode on synthetic records
    Bench {
        /// Number of records
        #[arg(short, long, default_value = "100000")]
        records: usize,

        /// Name length per record
        #[arg(long, default_value = "16")]
        name_len: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("❌ packline error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Source {
            input,
            dest,
            dry_run,
        } => run_source(config, input, dest, dry_run),
        Commands::Sink {
            bind,
            buffer_size,
            preview,
        } => run_sink(config, bind, buffer_size, preview),
        Commands::Bench { records, name_len } => {
            run_bench(config.codec, records, name_len);
            Ok(())
        }
    }
}

fn run_source(
    config: Config,
    input: PathBuf,
    dest: Option<SocketAddr>,
    dry_run: bool,
) -> Result<()> {
    let input = Input::open(&input)?;
    let bytes = input.as_bytes();

    let layout = plan(bytes);
    info!(
        input_bytes = bytes.len(),
        records = layout.len(),
        output_bytes = layout.total_size(),
        "layout planned"
    );

    let mut encoder = RecordEncoder::with_capacity(config.codec, layout.total_size());
    let summary = encoder.encode_planned(bytes, &layout)?;
    info!(
        records = summary.records,
        bytes = summary.bytes_written,
        "records encoded"
    );

    if dry_run || summary.records == 0 {
        info!("nothing sent");
        return Ok(());
    }

    let destination = dest.unwrap_or(config.source.destination);
    let ctx = TransportContext::init(config.transport)?;
    let result = ctx.send(destination, encoder.as_bytes());
    ctx.shutdown();

    let sent = result?;
    println!("✅ Sent {} records ({} bytes) to {}", summary.records, sent, destination);
    Ok(())
}

fn run_sink(
    config: Config,
    bind: Option<SocketAddr>,
    buffer_size: Option<usize>,
    preview: usize,
) -> Result<()> {
    let mut sink_config = config.sink;
    if let Some(bind) = bind {
        sink_config = sink_config.with_bind(bind);
    }
    if let Some(size) = buffer_size {
        sink_config = sink_config.with_buffer_size(size);
    }

    let ctx = TransportContext::init(config.transport)?;
    let sink = Sink::bind(&ctx, sink_config)?;
    println!("📡 Sink listening on {}", sink.local_addr());

    let result = sink.run(move |batch| {
        println!(
            "📥 {} records ({} bytes) from {}",
            batch.records.len(),
            batch.bytes_received,
            batch.peer
        );
        for record in batch.records.iter().take(preview) {
            println!(
                "   #{} mobile={} age={} name={:?}",
                record.index,
                record.mobile,
                record.age,
                record.name_lossy()
            );
        }
    });
    ctx.shutdown();

    let stats = result?;
    println!(
        "Batches: {} ok, {} failed, {} records",
        stats.batches_ok, stats.batches_failed, stats.records
    );
    Ok(())
}

/// Synthetic CSV, deterministic (LCG).
fn synthetic_input(records: usize, name_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + records * (16 + name_len));
    out.extend_from_slice(b"token,name\n");

    let mut seed: u64 = 0x5eed;
    for _ in 0..records {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let age = (seed >> 33) % 100;
        let mobile = (seed >> 7) % 10_000_000_000;
        out.extend_from_slice(format!("R{:02}-{:010},", age, mobile).as_bytes());
        out.extend((0..name_len).map(|i| b'a' + ((seed >> (i % 32)) % 26) as u8));
        out.push(b'\n');
    }
    out
}

fn run_bench(token: TokenLayout, records: usize, name_len: usize) {
    println!("📊 Codec Benchmark ({} records, name {} bytes)", records, name_len);
    println!("------------------------------------------------");

    let input = synthetic_input(records, name_len);

    let start = Instant::now();
    let layout = plan(&input);
    let plan_duration = start.elapsed();

    let mut encoder = RecordEncoder::with_capacity(token, layout.total_size());
    let start = Instant::now();
    if let Err(e) = encoder.encode_planned(&input, &layout) {
        eprintln!("❌ encode failed: {}", e);
        return;
    }
    let encode_duration = start.elapsed();

    let start = Instant::now();
    let decoded = decode(encoder.as_bytes()).count();
    let decode_duration = start.elapsed();

    let per_record = |d: std::time::Duration| d.as_nanos() as f64 / records.max(1) as f64;

    println!("  Input:   {} bytes", input.len());
    println!("  Output:  {} bytes", layout.total_size());
    println!("  Plan:    {:.2} ns/record", per_record(plan_duration));
    println!("  Encode:  {:.2} ns/record", per_record(encode_duration));
    println!("  Decode:  {:.2} ns/record", per_record(decode_duration));
    println!(
        "  Encode throughput: {:.2} MB/sec",
        input.len() as f64 / encode_duration.as_secs_f64() / 1_000_000.0
    );

    match decoded {
        Ok(n) if n == records => println!("\n✅ Round trip OK"),
        Ok(n) => println!("\n⚠️ Decoded {} of {} records", n, records),
        Err(e) => println!("\n❌ Decode failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_input_encodes() {
        let input = synthetic_input(50, 8);
        let mut encoder = RecordEncoder::default();
        let summary = encoder.encode(&input).unwrap();
        assert_eq!(summary.records, 50);
        assert_eq!(decode(encoder.as_bytes()).count().unwrap(), 50);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["packline", "-vv", "sink", "--preview", "5"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Sink { preview: 5, .. }));
    }
}
