//! End-to-end pipeline tests over synthetic sources.

use chapterize::{
    ChapterBlock, ChapterPipeline, ChapterizeError, ClassificationRequest, ClassificationResult,
    DirectorySink, LabelScore, MemorySink, MergeOptions, PipelineOptions, PipelineStage,
    PredictionDirectory, VideoSource, video_identity,
};
use image::{DynamicImage, RgbImage};

struct SyntheticVideo {
    frame_count: u64,
    frames_per_second: f64,
}

impl VideoSource for SyntheticVideo {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    fn read_frame(&mut self, index: u64) -> Result<Option<DynamicImage>, ChapterizeError> {
        if index == 151 {
            return Ok(None);
        }
        Ok(Some(DynamicImage::ImageRgb8(RgbImage::new(4, 4))))
    }
}

/// Frames before index 100 show the speaker, the rest show slides.
fn speaker_then_slides(
    request: &ClassificationRequest<'_>,
) -> Result<Vec<ClassificationResult>, ChapterizeError> {
    Ok(request
        .frames
        .iter()
        .rev()
        .map(|frame| {
            let (speaker, slides) = if frame.index < 100 { (0.9, 0.1) } else { (0.2, 0.8) };
            ClassificationResult::new(
                frame.index,
                vec![
                    LabelScore::new("speaker", speaker),
                    LabelScore::new("slides", slides),
                ],
            )
        })
        .collect())
}

fn thirty_fps() -> SyntheticVideo {
    SyntheticVideo {
        frame_count: 301,
        frames_per_second: 30.0,
    }
}

#[test]
fn process_source_produces_chapters() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides);
    let video = pipeline
        .process_source("gs://bucket/talk_part_4.ogv", &mut thirty_fps())
        .expect("Failed to process");

    assert_eq!(video.video_id, "talk_part_4");
    assert_eq!(video.frames.len(), 9);
    assert_eq!(video.skipped, vec![151]);
    assert_eq!(
        video.blocks,
        vec![
            ChapterBlock {
                label: "speaker".to_string(),
                start_frame: 1,
                end_frame: 91,
            },
            ChapterBlock {
                label: "slides".to_string(),
                start_frame: 121,
                end_frame: 271,
            },
        ]
    );
    assert_eq!(video.chapters.len(), 2);
    assert_eq!(video.chapters[0].display_name, "speaker");
    assert!(video.chapters[0].end < video.chapters[1].start);
}

#[test]
fn manifest_lists_every_written_frame() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides);
    let video = pipeline
        .process_source("talk.ogv", &mut thirty_fps())
        .expect("Failed to process");

    let reference = video.manifest.expect("Expected a manifest");
    let key = reference.trim_start_matches("memory://");
    assert!(key.starts_with("talk/frames-") && key.ends_with(".jsonl"), "{key}");

    let entries = pipeline.sink().manifest(key).expect("Manifest not stored");
    let contents: Vec<_> = entries.iter().map(|entry| entry.content.as_str()).collect();
    let uris: Vec<_> = video.frames.iter().map(|frame| frame.uri.as_str()).collect();
    assert_eq!(contents, uris);
    assert!(entries.iter().all(|entry| entry.mime_type == "image/png"));
}

#[test]
fn manifest_can_be_disabled() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides)
        .with_options(PipelineOptions::new().with_manifest(false));
    let video = pipeline
        .process_source("talk.ogv", &mut thirty_fps())
        .expect("Failed to process");
    assert!(video.manifest.is_none());
}

#[test]
fn classifier_sees_manifest_and_frames() {
    let classifier = |request: &ClassificationRequest<'_>| {
        assert_eq!(request.video_id, "talk");
        assert!(request.manifest.is_some());
        assert_eq!(request.frames.first().map(|frame| frame.index), Some(1));
        speaker_then_slides(request)
    };
    let pipeline = ChapterPipeline::new(MemorySink::new(), classifier);
    pipeline
        .process_source("talk.ogv", &mut thirty_fps())
        .expect("Failed to process");
}

// ── Stage-tagged failures ──────────────────────────────────────────

fn assert_stage(error: &ChapterizeError, expected: PipelineStage) {
    assert_eq!(error.stage(), Some(expected), "{error}");
}

#[test]
fn low_frame_rate_fails_in_sample_stage() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides);
    let mut video = SyntheticVideo {
        frame_count: 100,
        frames_per_second: 0.5,
    };
    let error = pipeline.process_source("talk.ogv", &mut video).unwrap_err();

    assert_stage(&error, PipelineStage::Sample);
    match error {
        ChapterizeError::Stage { source, .. } => {
            assert!(matches!(*source, ChapterizeError::InvalidFrameRate(_)));
        }
        other => panic!("Expected Stage, got: {other:?}"),
    }
    assert!(pipeline.sink().is_empty());
}

#[test]
fn classifier_failure_fails_in_classify_stage() {
    let classifier = |_: &ClassificationRequest<'_>| -> Result<Vec<ClassificationResult>, ChapterizeError> {
        Err(ChapterizeError::Cancelled)
    };
    let pipeline = ChapterPipeline::new(MemorySink::new(), classifier);
    let error = pipeline
        .process_source("talk.ogv", &mut thirty_fps())
        .unwrap_err();
    assert_stage(&error, PipelineStage::Classify);
    assert!(error.to_string().starts_with("classify stage failed"), "{error}");
}

#[test]
fn no_results_fail_in_merge_stage() {
    let classifier = |_: &ClassificationRequest<'_>| -> Result<Vec<ClassificationResult>, ChapterizeError> {
        Ok(Vec::new())
    };
    let pipeline = ChapterPipeline::new(MemorySink::new(), classifier);
    let error = pipeline
        .process_source("talk.ogv", &mut thirty_fps())
        .unwrap_err();
    assert_stage(&error, PipelineStage::Merge);
}

#[test]
fn allow_empty_merges_to_no_chapters() {
    let classifier = |_: &ClassificationRequest<'_>| -> Result<Vec<ClassificationResult>, ChapterizeError> {
        Ok(Vec::new())
    };
    let options =
        PipelineOptions::new().with_merge_options(MergeOptions::new().with_allow_empty(true));
    let pipeline = ChapterPipeline::new(MemorySink::new(), classifier).with_options(options);
    let video = pipeline
        .process_source("talk.ogv", &mut thirty_fps())
        .expect("Failed to process");
    assert!(video.chapters.is_empty());
}

#[test]
fn missing_video_fails_in_open_stage() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides);
    let error = pipeline.process("this_file_does_not_exist.mp4").unwrap_err();
    assert_stage(&error, PipelineStage::Open);
}

#[test]
fn process_many_keeps_failures_isolated_and_ordered() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let pipeline = ChapterPipeline::new(
        DirectorySink::new(directory.path().join("frames")),
        PredictionDirectory::new(directory.path().join("predictions")),
    )
    .with_options(PipelineOptions::new().with_parallelism(2));

    let inputs = ["missing_1.ogv", "missing_2.ogv", "missing_3.ogv"];
    let results = pipeline.process_many(&inputs);

    assert_eq!(results.len(), inputs.len());
    for result in &results {
        let error = result.as_ref().unwrap_err();
        assert_stage(error, PipelineStage::Open);
    }
}

// ── Multi-video runs ───────────────────────────────────────────────

/// Opens a synthetic video per URI: `broken` fails to open, `slow` has an
/// unusable frame rate, anything else is a regular talk.
fn open_synthetic(uri: &str) -> Result<SyntheticVideo, ChapterizeError> {
    if uri.contains("broken") {
        return Err(ChapterizeError::NoVideoStream);
    }
    let frames_per_second = if uri.contains("slow") { 0.5 } else { 30.0 };
    Ok(SyntheticVideo {
        frame_count: 301,
        frames_per_second,
    })
}

#[test]
fn process_many_mixes_successes_and_failures() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides)
        .with_options(PipelineOptions::new().with_parallelism(3));

    let inputs = [
        "gs://bucket/first.ogv",
        "gs://bucket/broken.ogv",
        "gs://bucket/second.ogv",
        "gs://bucket/slow.ogv",
        "gs://bucket/third.ogv",
    ];
    let results = pipeline.process_many_with(&inputs, open_synthetic);
    assert_eq!(results.len(), inputs.len());

    for (index, expected) in [(0, "first"), (2, "second"), (4, "third")] {
        let video = results[index].as_ref().expect("Sibling should succeed");
        assert_eq!(video.video, inputs[index]);
        assert_eq!(video.video_id, expected);
        assert_eq!(video.chapters.len(), 2);
    }

    let broken = results[1].as_ref().unwrap_err();
    assert_stage(broken, PipelineStage::Open);
    let slow = results[3].as_ref().unwrap_err();
    assert_stage(slow, PipelineStage::Sample);

    let keys = pipeline.sink().keys();
    assert!(keys.iter().all(|key| !key.starts_with("slow/")), "{keys:?}");
    assert!(keys.contains(&"third/271.png".to_string()), "{keys:?}");
}

#[test]
fn process_with_tags_opener_errors() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides);
    let error = pipeline
        .process_with("broken.ogv", open_synthetic)
        .unwrap_err();
    assert_stage(&error, PipelineStage::Open);

    let video = pipeline
        .process_with("talk.ogv", open_synthetic)
        .expect("Failed to process");
    assert_eq!(video.skipped, vec![151]);
}

#[test]
fn video_identity_keeps_directories() {
    let cases = [
        ("gs://bucket/talk.ogv", "talk"),
        ("gs://bucket/2011/talk.ogv", "2011/talk"),
        ("gs://bucket/2012/talk.ogv", "2012/talk"),
        ("s3://bucket/a/b/c.tar.gz", "a/b/c.tar"),
        ("C:\\recordings\\day 1\\keynote.mkv", "recordings/day 1/keynote"),
        ("./talks/../intro.mp4", "talks/intro"),
        (".hidden", ".hidden"),
        ("gs://bucket/", "video"),
    ];
    for (uri, expected) in cases {
        assert_eq!(video_identity(uri), expected, "{uri}");
    }
}

#[test]
fn same_file_names_in_different_folders_stay_apart() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides);
    let inputs = ["gs://bucket/2011/talk.ogv", "gs://bucket/2012/talk.ogv"];
    let results = pipeline.process_many_with(&inputs, open_synthetic);

    let ids: Vec<_> = results
        .iter()
        .map(|result| result.as_ref().expect("Both videos should succeed").video_id.as_str())
        .collect();
    assert_eq!(ids, vec!["2011/talk", "2012/talk"]);

    let keys = pipeline.sink().keys();
    assert!(keys.contains(&"2011/talk/1.png".to_string()), "{keys:?}");
    assert!(keys.contains(&"2012/talk/1.png".to_string()), "{keys:?}");
}

#[test]
fn repeated_video_identity_is_rejected() {
    let pipeline = ChapterPipeline::new(MemorySink::new(), speaker_then_slides);
    let inputs = ["gs://bucket/talk.ogv", "gs://bucket/talk.mp4", "gs://other/talk.ogv"];
    let results = pipeline.process_many_with(&inputs, open_synthetic);

    assert!(results[0].is_ok());
    for (index, result) in results.iter().enumerate().skip(1) {
        let error = result.as_ref().unwrap_err();
        assert_stage(error, PipelineStage::Open);
        match error {
            ChapterizeError::Stage { source, .. } => match &**source {
                ChapterizeError::DuplicateVideo { video_id, uri } => {
                    assert_eq!(video_id, "talk");
                    assert_eq!(uri, inputs[index]);
                }
                other => panic!("Expected DuplicateVideo, got: {other:?}"),
            },
            other => panic!("Expected Stage, got: {other:?}"),
        }
    }
}
