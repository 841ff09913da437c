//! Benchmarks for sampling and merging.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! The decoding benchmarks require `tests/fixtures/sample_video.mp4`.

use std::{hint::black_box, path::Path};

use chapterize::{
    ClassificationResult, FfmpegLogLevel, FrameSampler, LabelScore, MediaFile, MergeOptions,
    SampleOptions, VideoSource,
};
use criterion::{BenchmarkId, Criterion};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

/// One result per second of a two-hour talk, switching label every minute.
fn synthetic_results(count: u64) -> Vec<ClassificationResult> {
    let labels = ["speaker", "slides", "demo", "audience"];
    (0..count)
        .rev()
        .map(|second| {
            let top = labels[(second / 60) as usize % labels.len()];
            let scores = labels
                .iter()
                .map(|&label| LabelScore::new(label, if label == top { 0.7 } else { 0.1 }))
                .collect();
            ClassificationResult::new(1 + second * 30, scores)
        })
        .collect()
}

fn benchmark_sample_indices(criterion: &mut Criterion) {
    criterion.bench_function("sample indices (2h at 29.97 fps)", |bencher| {
        bencher.iter(|| chapterize::sample_indices(black_box(215_784), black_box(29.97)).unwrap());
    });
}

fn benchmark_merge(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("merge chapters");
    for count in [600_u64, 7_200] {
        let results = synthetic_results(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &results, |bencher, results| {
            bencher.iter(|| {
                chapterize::merge_chapters(black_box(results), 30.0, &MergeOptions::new()).unwrap()
            });
        });
    }
    group.finish();
}

fn benchmark_sampling(criterion: &mut Criterion) {
    chapterize::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    criterion.bench_function("read one sampled frame", |bencher| {
        bencher.iter(|| {
            let mut media = MediaFile::open(SAMPLE_VIDEO).unwrap();
            let _frame = media.read_frame(31).unwrap();
        });
    });

    let options = SampleOptions::new();
    criterion.bench_function("sample whole fixture", |bencher| {
        bencher.iter(|| {
            let mut media = MediaFile::open(SAMPLE_VIDEO).unwrap();
            let _frames = FrameSampler::new(&options).sample_frames(&mut media).unwrap();
        });
    });
}

criterion::criterion_group!(
    benches,
    benchmark_sample_indices,
    benchmark_merge,
    benchmark_sampling,
);
criterion::criterion_main!(benches);
