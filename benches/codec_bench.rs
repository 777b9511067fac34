//! Criterion benchmark untuk codec
//!
//! Run dengan: cargo bench

use std::io::Write;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use packline::protocol::{decode, encode, plan};

fn synthetic_input(records: usize, name_len: usize) -> Vec<u8> {
    let mut input = b"token,name\n".to_vec();
    let name = vec![b'n'; name_len];
    for i in 0..records {
        write!(input, "B{:02}-{:010},", i % 100, i).unwrap();
        input.extend_from_slice(&name);
        input.push(b'\n');
    }
    input
}

fn bench_passes(c: &mut Criterion) {
    let input = synthetic_input(10_000, 24);
    let layout = plan(&input);
    let mut packed = vec![0u8; layout.total_size()];
    encode(&input, &layout, &mut packed).unwrap();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(layout.len() as u64));

    group.bench_function("plan", |b| {
        b.iter(|| black_box(plan(black_box(&input))));
    });

    group.bench_function("encode", |b| {
        let mut out = vec![0u8; layout.total_size()];
        b.iter(|| encode(black_box(&input), &layout, &mut out).unwrap());
    });

    group.bench_function("decode", |b| {
        b.iter(|| {
            for record in decode(black_box(&packed)) {
                black_box(record.unwrap());
            }
        });
    });

    group.finish();
}

fn bench_name_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("name_length");

    for name_len in [0usize, 32, 255].iter() {
        let input = synthetic_input(1_000, *name_len);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_function(format!("plan_encode_{}", name_len), |b| {
            b.iter(|| {
                let layout = plan(black_box(&input));
                let mut out = vec![0u8; layout.total_size()];
                encode(&input, &layout, &mut out).unwrap();
                black_box(out)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_passes, bench_name_length);
criterion_main!(benches);
