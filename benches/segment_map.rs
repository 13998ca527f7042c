//! Benchmarks for segment mapping and part-name canonicalization.
//!
//! Run with: `cargo bench`
//! Compare with baseline: `cargo bench -- --save-baseline main`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use usenet_archive_stream::{
    map_range, map_volume_spans, slice_part_segments, ArchiveFormat, Part, PartSet, VolumeSpan,
};

/// Typical yEnc article payload.
const ARTICLE_SIZE: u64 = 768_000;

/// Archive of `volumes` parts with `per_part` articles each.
fn archive(volumes: usize, per_part: usize) -> PartSet {
    let parts = (0..volumes)
        .map(|v| {
            Part::from_segment_sizes(
                format!("release.part{:03}.rar", v + 1),
                (0..per_part).map(|s| (format!("part{}-seg{}@news", v, s), ARTICLE_SIZE)),
            )
        })
        .collect();
    PartSet::new(parts)
}

/// Slicing a small window out of one large part
fn bench_slice_part(c: &mut Criterion) {
    let set = archive(1, 2000);
    let part = &set.parts()[0];
    let mut group = c.benchmark_group("slice_part");

    for offset in [0u64, 500 * ARTICLE_SIZE, 1999 * ARTICLE_SIZE] {
        group.bench_with_input(BenchmarkId::from_parameter(offset), &offset, |b, &offset| {
            b.iter(|| slice_part_segments(black_box(&part.segments), offset + 100, 4 * 1024 * 1024));
        });
    }

    group.finish();
}

/// Mapping a whole multi-gigabyte entry across many volumes
fn bench_map_range(c: &mut Criterion) {
    let set = archive(100, 130);
    let total = set.total_size();

    c.bench_function("map_range_full_archive", |b| {
        b.iter(|| map_range(black_box(512), total - 1024, set.windows()));
    });
}

fn bench_map_volume_spans(c: &mut Criterion) {
    let set = archive(100, 130);
    let part_size = 130 * ARTICLE_SIZE;
    let spans: Vec<VolumeSpan> = set
        .names()
        .into_iter()
        .map(|name| VolumeSpan::new(name, 120, part_size - 120))
        .collect();

    c.bench_function("map_volume_spans_100_volumes", |b| {
        b.iter(|| map_volume_spans(black_box(&spans), &set));
    });
}

fn bench_canonicalize(c: &mut Criterion) {
    let set = archive(200, 1);
    let mut parts: Vec<Part> = set.parts().iter().map(|p| (**p).clone()).collect();
    parts.reverse();

    c.bench_function("canonicalize_200_parts", |b| {
        b.iter(|| ArchiveFormat::Rar.canonicalize(black_box(parts.clone())));
    });
}

criterion_group!(
    benches,
    bench_slice_part,
    bench_map_range,
    bench_map_volume_spans,
    bench_canonicalize
);
criterion_main!(benches);
