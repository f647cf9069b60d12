use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vrts_common::ComparisonRequest;
use vrts_core::{compare_chunk, CompareMode, FileComparator};

// Pseudo-random PCM16LE samples
fn create_pcm(samples: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    let mut data = Vec::with_capacity(samples * 2);
    for _ in 0..samples {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        data.extend_from_slice(&((state >> 16) as i16).to_le_bytes());
    }
    data
}

// Same samples, every 64th nudged by one (the first 0x80 bytes stay intact)
fn nudge(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for offset in (128..out.len()).step_by(128) {
        let sample = i16::from_le_bytes([out[offset], out[offset + 1]]);
        out[offset..offset + 2].copy_from_slice(&sample.saturating_add(1).to_le_bytes());
    }
    out
}

fn write_pair(root: &Path, first: &[u8], second: &[u8]) -> (PathBuf, PathBuf) {
    let first_path = root.join("bench.new.wav");
    let second_path = root.join("bench.old.wav");
    fs::write(&first_path, first).unwrap();
    fs::write(&second_path, second).unwrap();
    (first_path, second_path)
}

fn bench_chunk_exact(c: &mut Criterion) {
    let data = create_pcm(512 * 1024, 1);
    c.bench_function("chunk_exact_1mb", |b| {
        b.iter(|| black_box(compare_chunk(CompareMode::Exact, black_box(&data), black_box(&data))));
    });
}

fn bench_chunk_fuzzy(c: &mut Criterion) {
    let data = create_pcm(512 * 1024, 2);
    let nudged = nudge(&data);
    c.bench_function("chunk_fuzzy_1mb", |b| {
        b.iter(|| {
            black_box(compare_chunk(CompareMode::Fuzzy(1), black_box(&data), black_box(&nudged)))
        });
    });
}

fn bench_files_by_workers(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let data = create_pcm(4 * 1024 * 1024, 3);
    let (first, second) = write_pair(temp.path(), &data, &nudge(&data));

    let mut group = c.benchmark_group("fuzzy_file_8mb");
    group.sample_size(10);

    for workers in [1usize, 2, 4].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(workers), workers, |b, &workers| {
            let request = ComparisonRequest::new(&first, &second)
                .with_tolerance(1)
                .with_header_size(0x50)
                .with_chunk_size(0x0010_0000)
                .with_workers(workers);

            b.iter(|| black_box(FileComparator::compare(black_box(&request))));
        });
    }

    group.finish();
}

criterion_group!(chunk_benches, bench_chunk_exact, bench_chunk_fuzzy);

criterion_group!(file_benches, bench_files_by_workers);

criterion_main!(chunk_benches, file_benches);
