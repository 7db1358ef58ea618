//! Benchmarks for change detection algorithms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use altermap_algorithms::change::{block_pca_kmeans, discriminate, irmad, BlockPcaParams, IrmadParams};
use altermap_algorithms::morphology::{remove_small_objects, Connectivity};
use altermap_algorithms::threshold::{optimize_threshold, ThresholdParams};
use altermap_core::{Raster, RasterStack};
use ndarray::Array3;

fn create_test_stack(bands: usize, size: usize, shift: f64) -> RasterStack {
    RasterStack::from_array(Array3::from_shape_fn((bands, size, size), |(b, r, c)| {
        let base = ((r * 7 + c * 13 + b * 31) % 256) as f64;
        let changed = r > size / 3 && r < size / 2 && c > size / 3 && c < size / 2;
        base + if changed { shift * (b + 1) as f64 } else { ((r + c + b) % 5) as f64 }
    }))
}

fn bench_irmad(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/irmad");
    group.sample_size(10);
    for size in [128, 256, 512] {
        let x = create_test_stack(4, size, 0.0).flatten().unwrap();
        let y = create_test_stack(4, size, 60.0).flatten().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| irmad(black_box(x.view()), black_box(y.view()), &IrmadParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_block_pca(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/block_pca_kmeans");
    group.sample_size(10);
    for size in [100, 200, 400] {
        let a = create_test_stack(1, size, 0.0).band_mean();
        let b_img = create_test_stack(1, size, 90.0).band_mean();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| block_pca_kmeans(black_box(&a), black_box(&b_img), &BlockPcaParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold/optimize");
    for size in [256, 512, 1024] {
        let magnitude = Raster::from_vec(
            (0..size * size).map(|i| ((i * 37) % 1000) as f64 / 1000.0).collect(),
            size,
            size,
        )
        .unwrap();
        let t1 = Raster::filled(size, size, 0i32);
        let t2 = magnitude.map(|&m| if m > 0.7 { 1i32 } else { 0 });
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| optimize_threshold(black_box(&magnitude), &t1, &t2, &ThresholdParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_transitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/discriminate");
    for size in [256, 512] {
        let p1 = RasterStack::from_array(Array3::from_shape_fn((6, size, size), |(b, r, c)| {
            ((b + r + c) % 6) as f64 / 6.0
        }));
        let p2 = RasterStack::from_array(Array3::from_shape_fn((6, size, size), |(b, r, c)| {
            ((b * 2 + r + c * 3) % 6) as f64 / 6.0
        }));
        let mask = Raster::filled(size, size, 1u8);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| discriminate(black_box(&p1), black_box(&p2), &mask, 6).unwrap())
        });
    }
    group.finish();
}

fn bench_small_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/remove_small_objects");
    for size in [256, 512, 1024, 2048] {
        let mask = Raster::from_vec(
            (0..size * size).map(|i| u8::from((i * 7919) % 11 < 4)).collect(),
            size,
            size,
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| remove_small_objects(black_box(&mask), 10, Connectivity::Eight))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_irmad,
    bench_block_pca,
    bench_threshold,
    bench_transitions,
    bench_small_objects,
);
criterion_main!(benches);
