use criterion::{black_box, criterion_group, criterion_main, Criterion};
use unlnk::archive::{self, ExtractOptions, VecSink};
use unlnk::codec::{compress_lnd, decompress_lnd};

/// ~1 MiB of mixed content: literal stretches alternating with runs.
fn mixed_payload() -> Vec<u8> {
    let mut data = Vec::with_capacity(1024 * 1024);
    for i in 0..1024 * 1024 {
        data.push(if (i / 512) % 2 == 0 { (i % 251) as u8 } else { 0xAA });
    }
    data
}

fn build_container(entries: &[(String, Vec<u8>, bool)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"LNK\0");
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 8]);
    let mut payloads = Vec::new();
    let mut relative = 0u32;
    for (name, stored, compressed) in entries {
        out.extend_from_slice(&relative.to_le_bytes());
        let word = ((stored.len() as u32) << 1) | u32::from(*compressed);
        out.extend_from_slice(&word.to_le_bytes());
        let mut name_field = [0u8; 24];
        name_field[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&name_field);
        payloads.extend_from_slice(stored);
        relative += stored.len() as u32;
    }
    out.extend_from_slice(&payloads);
    out
}

fn bench_decompress(c: &mut Criterion) {
    let framed = compress_lnd(&mixed_payload());
    c.bench_function("lnd_decompress_1mb", |b| {
        b.iter(|| decompress_lnd(black_box(&framed)).unwrap())
    });
}

fn bench_extract_archive(c: &mut Criterion) {
    // 100 compressed entries of 16 KiB each.
    let chunk: Vec<u8> = mixed_payload()[..16 * 1024].to_vec();
    let entries: Vec<(String, Vec<u8>, bool)> = (0..100)
        .map(|i| (format!("file_{i:03}.bin"), compress_lnd(&chunk), true))
        .collect();
    let container = build_container(&entries);
    let opts = ExtractOptions::default();

    c.bench_function("extract_100x16k", |b| {
        b.iter(|| {
            let mut sink = VecSink::default();
            archive::extract(black_box(&container), &mut sink, &opts).unwrap()
        })
    });
}

criterion_group!(benches, bench_decompress, bench_extract_archive);
criterion_main!(benches);
