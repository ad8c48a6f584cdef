//! Candidate scoring and per-frame classification throughput.
//!
//! ```bash
//! cargo bench -p hot-target-tracker --bench candidate_scoring
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hot_target_tracker::{classify_shapes, Candidate, Shape, Thresholds};
use nalgebra::Point2;

fn rect(x: i32, y: i32, w: i32, h: i32) -> Shape {
    vec![
        Point2::new(x, y),
        Point2::new(x + w, y),
        Point2::new(x + w, y + h),
        Point2::new(x, y + h),
    ]
}

/// A frame with one real target pair and `noise` small blobs around it.
fn synthetic_frame(noise: usize) -> Vec<Shape> {
    let mut shapes = vec![rect(200, 100, 8, 64), rect(120, 100, 47, 8)];
    shapes.extend((0..noise).map(|i| {
        let i = i as i32;
        rect((i * 37) % 600, (i * 53) % 440, 4 + i % 9, 4 + (i * 7) % 11)
    }));
    shapes
}

fn bench_candidate(c: &mut Criterion) {
    let t = Thresholds::default();
    let shape = rect(200, 100, 8, 64);
    c.bench_function("candidate_new", |b| {
        b.iter(|| Candidate::new(black_box(shape.clone()), &t))
    });
}

fn bench_classify(c: &mut Criterion) {
    let t = Thresholds::default();
    let mut group = c.benchmark_group("classify_shapes");
    for noise in [0usize, 16, 128] {
        let shapes = synthetic_frame(noise);
        group.throughput(Throughput::Elements(shapes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(noise), &shapes, |b, shapes| {
            b.iter(|| classify_shapes(black_box(shapes.clone()), &t))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_candidate, bench_classify);
criterion_main!(benches);
