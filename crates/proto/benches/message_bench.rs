//! SFTP message codec benchmarks
//!
//! Benchmarks for NAME decoding (the hot path of a recursive listing) and
//! DATA framing during downloads.
//!
//! Run with: `cargo bench --bench message_bench`

#![cfg(feature = "sftp")]

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use usftp_proto::sftp::{FileAttributes, FileMode, NameEntry, SftpMessage};

/// Create a NAME reply with `count` fully attributed entries
fn create_name_message(count: usize) -> SftpMessage {
    let entries = (0..count)
        .map(|i| {
            let name = format!("file-{:05}.dat", i);
            NameEntry::new(
                name.clone(),
                format!("-rw-r--r-- 1 test test {} Jan 1 00:00 {}", i, name),
                FileAttributes {
                    size: Some(i as u64),
                    uid: Some(1000),
                    gid: Some(1000),
                    permissions: Some(FileMode(0o100644)),
                    atime: Some(1_700_000_000),
                    mtime: Some(1_700_000_000),
                    extended_count: None,
                },
            )
        })
        .collect();
    SftpMessage::Name { id: 42, entries }
}

fn bench_name_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("name");

    for count in [1usize, 100, 1000] {
        let wire = create_name_message(count).to_bytes().unwrap();
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_function(format!("decode_{}_entries", count), |b| {
            b.iter(|| SftpMessage::from_bytes(black_box(&wire)).unwrap())
        });
    }

    let message = create_name_message(100);
    group.bench_function("encode_100_entries", |b| {
        b.iter(|| black_box(&message).to_bytes().unwrap())
    });

    group.finish();
}

fn bench_data_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("data");

    let message = SftpMessage::Data {
        id: 7,
        data: Bytes::from(vec![0xA5u8; 255 * 1024]),
    };
    let wire = message.to_bytes().unwrap();

    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("encode_255k", |b| {
        b.iter(|| black_box(&message).to_bytes().unwrap())
    });
    group.bench_function("decode_255k", |b| {
        b.iter(|| SftpMessage::from_bytes(black_box(&wire)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_name_decode, bench_data_framing);
criterion_main!(benches);
