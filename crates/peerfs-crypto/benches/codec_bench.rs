//! Performance benchmarks for the staging codec.
//!
//! Run with: `cargo bench -p peerfs-crypto`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use peerfs_crypto::{Tag, compress_and_encrypt, decrypt_and_decompress, derive_key};
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn bench_derive_key(c: &mut Criterion) {
    c.bench_function("derive_key", |b| {
        b.iter(|| derive_key(black_box("correct horse battery staple")))
    });
}

fn bench_stage(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("compress_and_encrypt");

    for size in [4 * 1024, 256 * 1024, 4 * 1024 * 1024] {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        let staged = dir.path().join("staged");
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(&plain, &data).unwrap();
        let tag = Tag::generate().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(compress_and_encrypt(&plain, &staged, "pw", &tag))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_restore(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("decrypt_and_decompress");

    for size in [4 * 1024, 256 * 1024, 4 * 1024 * 1024] {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        let staged = dir.path().join("staged");
        let restored = dir.path().join("restored");
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(&plain, &data).unwrap();
        let tag = Tag::generate().unwrap();
        rt.block_on(compress_and_encrypt(&plain, &staged, "pw", &tag))
            .unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(decrypt_and_decompress(&staged, &restored, "pw", &tag))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_derive_key, bench_stage, bench_restore);
criterion_main!(benches);
