//! Benchmark for noise sampling and chunk content generation.
//!
//! TARGET: a 64x64 chunk in well under one frame (16ms) on one worker
//!
//! Run with: cargo bench --package tilestream_procedural --bench generation_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tilestream_procedural::{
    generate_chunk_cells, BandedGenerator, CellOrder, ChunkCoord, ContentGenerator, NoiseSeed,
    SimplexNoise,
};

fn benchmark_single_sample(c: &mut Criterion) {
    let noise = SimplexNoise::new(NoiseSeed::new(42));

    c.bench_function("single_noise_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample(black_box(x), black_box(x * 0.7)))
        });
    });
}

fn benchmark_banded_cell(c: &mut Criterion) {
    let gen = BandedGenerator::with_seed(NoiseSeed::new(42));

    c.bench_function("banded_cell_classification", |b| {
        let mut x = 0i32;
        b.iter(|| {
            x = x.wrapping_add(1);
            black_box(gen.generate(black_box(x), black_box(x / 3)))
        });
    });
}

fn benchmark_chunk_fill(c: &mut Criterion) {
    let gen = BandedGenerator::with_seed(NoiseSeed::new(42));

    let mut group = c.benchmark_group("chunk_fill");
    for size in [16u32, 64] {
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));
        group.bench_function(format!("{size}x{size}_row_major"), |b| {
            let mut coord = 0i32;
            b.iter(|| {
                coord = coord.wrapping_add(1);
                black_box(generate_chunk_cells(
                    &gen,
                    ChunkCoord::new(coord, -coord),
                    size,
                    CellOrder::RowMajor,
                ))
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_single_sample,
    benchmark_banded_cell,
    benchmark_chunk_fill
);
criterion_main!(benches);
