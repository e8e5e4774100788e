//! Performance benchmarks for the sqlsweep scanner

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sqlsweep::network::AddressEnumerator;
use sqlsweep::scanner::probe::{classify_handshake, parse_server_version};

/// Benchmark CIDR expansion
fn bench_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumeration");

    for cidr in ["10.0.0.0/24", "10.0.0.0/20", "10.0.0.0/16"] {
        let targets = AddressEnumerator::parse(cidr).unwrap();
        group.bench_with_input(BenchmarkId::new("iterate", cidr), &targets, |b, targets| {
            b.iter(|| black_box(targets.iter().count()))
        });
    }

    group.bench_function("parse", |b| {
        b.iter(|| black_box(AddressEnumerator::parse(black_box("172.16.33.7/22")).unwrap()))
    });

    group.finish();
}

/// Benchmark greeting classification
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    let greeting: &[u8] = b"\x4a\x00\x00\x00\x0a8.0.36\x00\x0b\x00\x00\x00abcdefgh\x00";
    let ssh: &[u8] = b"SSH-2.0-OpenSSH_9.6\r\n";

    group.bench_function("classify_greeting", |b| {
        b.iter(|| black_box(classify_handshake(black_box(greeting))))
    });
    group.bench_function("classify_other", |b| {
        b.iter(|| black_box(classify_handshake(black_box(ssh))))
    });
    group.bench_function("server_version", |b| {
        b.iter(|| black_box(parse_server_version(black_box(greeting))))
    });

    group.finish();
}

criterion_group!(benches, bench_enumeration, bench_classification);
criterion_main!(benches);
