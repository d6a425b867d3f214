//! Benchmarks pour la détection et la classification

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geomsniff::{classify, classify_batch, detect_text, ClassifyOptions, RowInput};

/// Une valeur représentative par format
fn samples() -> Vec<(&'static str, &'static str)> {
    vec![
        ("wkt", "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 4 2, 4 4, 2 2))"),
        ("ewkt", "SRID=4326;LINESTRING(2.35 48.85, -1.55 47.21, 5.37 43.29)"),
        ("ewkb", "0101000020E6100000000000000000F03F0000000000002440"),
        (
            "geojson",
            r#"{"type":"MultiPoint","coordinates":[[2.35,48.85],[-1.55,47.21],[5.37,43.29]]}"#,
        ),
        (
            "kml",
            "<Placemark><Point><coordinates>2.35,48.85,35</coordinates></Point></Placemark>",
        ),
        ("earth_engine", "ee.Geometry.Rectangle([76.5, 28.0, 77.5, 29.0])"),
        (
            "topojson",
            r#"{"type":"Topology","arcs":[[[0,0],[1,0],[1,1]],[[1,1],[0,1],[0,0]]],"objects":{"a":{"type":"Polygon","arcs":[[0,1]]}}}"#,
        ),
        ("unknown", "not a geometry at all"),
    ]
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");

    for (name, value) in samples() {
        group.throughput(Throughput::Bytes(value.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), value, |b, value| {
            b.iter(|| black_box(detect_text(black_box(value))))
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for (name, value) in samples() {
        group.throughput(Throughput::Bytes(value.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), value, |b, value| {
            b.iter(|| black_box(classify(RowInput::text(black_box(value)), None, true)))
        });
    }

    group.finish();
}

fn bench_classify_parallel(c: &mut Criterion) {
    let samples = samples();
    let rows: Vec<RowInput<'_>> = (0..100_000)
        .map(|i| RowInput::text(samples[i % samples.len()].1))
        .collect();
    let total_size: u64 = rows
        .iter()
        .filter_map(|r| r.raw)
        .map(|v| v.len() as u64)
        .sum();
    let options = ClassifyOptions::default();

    let mut group = c.benchmark_group("classify_parallel");
    group.throughput(Throughput::Bytes(total_size));
    group.sample_size(10);

    group.bench_function("sequential", |b| {
        b.iter(|| {
            let valid = rows
                .iter()
                .filter(|row| classify(**row, None, true).is_valid())
                .count();
            black_box(valid)
        })
    });

    group.bench_function("rayon", |b| {
        b.iter(|| {
            let (outcomes, stats) = classify_batch(black_box(&rows), &options);
            black_box((outcomes.len(), stats))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_detect,
    bench_classify,
    bench_classify_parallel
);
criterion_main!(benches);
