// Feature pipeline benchmark - frame preprocessing, feature building and dedup
//
// Run with: cargo bench --bench feature_pipeline_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formcheck::common::{FeatureVector, Label, LabeledSample, LandmarkPoint, LandmarkSet, SampleSource};
use formcheck::dataset::dedup_samples;
use formcheck::features::{build_canonical_features, normalize};
use formcheck::pose::preprocess;
use image::{ImageBuffer, Rgb, RgbImage};
use std::path::PathBuf;

fn landmarks(count: usize) -> LandmarkSet {
    let points = (0..count)
        .map(|i| {
            let t = i as f32 / count as f32;
            LandmarkPoint::new(t, 1.0 - t, t * 0.1, 0.9)
        })
        .collect();
    LandmarkSet::new(points).expect("valid landmark count")
}

/// Frame resize + normalize at the landmark model's input size
fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");

    for (width, height, name) in [(640, 480, "640x480"), (1280, 720, "1280x720")] {
        let frame: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        group.bench_with_input(BenchmarkId::new("256", name), &frame, |b, img| {
            b.iter(|| black_box(preprocess(black_box(img), 256)));
        });
    }

    group.finish();
}

/// Landmarks to canonical features, both layouts
fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");

    for count in [33, 44] {
        let set = landmarks(count);
        group.bench_with_input(BenchmarkId::new("canonical", count), &set, |b, set| {
            b.iter(|| black_box(build_canonical_features(black_box(set))));
        });
    }

    let extended: Vec<f32> = (0..132).map(|i| i as f32 * 0.01).collect();
    group.bench_function("normalize_132", |b| {
        b.iter(|| black_box(normalize(black_box(&extended))));
    });

    group.finish();
}

/// Dedup over datasets where every fourth row repeats an earlier one
fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");

    for size in [1_000, 10_000] {
        let samples: Vec<LabeledSample> = (0..size)
            .map(|i| {
                let seed = if i % 4 == 3 { i - 3 } else { i };
                let values = (0..99).map(|j| (seed * 99 + j) as f32).collect();
                LabeledSample {
                    features: FeatureVector::new(values).expect("non-empty"),
                    label: if seed % 2 == 0 { Label::Correct } else { Label::Incorrect },
                    source: SampleSource {
                        class_dir: "Valid".to_string(),
                        session: format!("session_{}", i % 10),
                        path: PathBuf::from(format!("{i}.npy")),
                    },
                }
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &samples, |b, samples| {
            b.iter(|| black_box(dedup_samples(samples.clone())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_features, bench_dedup);
criterion_main!(benches);
