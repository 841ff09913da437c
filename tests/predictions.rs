//! Manifest and prediction record tests.

use std::{fs, io::Cursor};

use chapterize::{
    ChapterizeError, ClassificationRequest, Classifier, FrameReference, ManifestEntry,
    MergeOptions, PredictionDirectory, frame_index_from_reference, parse_predictions,
    read_predictions, write_manifest,
};
use image::ImageFormat;

fn record(reference: &str, names: &[&str], confidences: &[f64]) -> String {
    serde_json::json!({
        "instance": { "content": reference },
        "prediction": { "confidences": confidences, "displayNames": names },
    })
    .to_string()
}

// ── Manifest ───────────────────────────────────────────────────────

#[test]
fn manifest_lines_use_batch_job_field_names() {
    let frames = vec![
        FrameReference {
            index: 1,
            uri: "frames/talk/1.png".to_string(),
        },
        FrameReference {
            index: 31,
            uri: "frames/talk/31.png".to_string(),
        },
    ];
    let entries = ManifestEntry::for_frames(&frames, ImageFormat::Png);

    let mut buffer = Vec::new();
    write_manifest(&mut buffer, &entries).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        r#"{"content":"frames/talk/1.png","mimeType":"image/png"}"#
    );
    let second: ManifestEntry = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second.content, "frames/talk/31.png");
}

#[test]
fn jpeg_manifest_mime_type() {
    let frames = vec![FrameReference {
        index: 1,
        uri: "talk/1.jpg".to_string(),
    }];
    let entries = ManifestEntry::for_frames(&frames, ImageFormat::Jpeg);
    assert_eq!(entries[0].mime_type, "image/jpeg");
}

// ── Frame references ───────────────────────────────────────────────

#[test]
fn frame_index_comes_from_the_file_stem() {
    assert_eq!(frame_index_from_reference("gs://bucket/talk/271.png").unwrap(), 271);
    assert_eq!(frame_index_from_reference("31.png").unwrap(), 31);
    assert_eq!(frame_index_from_reference(r"C:\frames\talk\61.jpg").unwrap(), 61);
}

#[test]
fn non_numeric_references_are_rejected() {
    for reference in ["gs://bucket/talk/cover.png", "", "gs://bucket/talk/"] {
        assert!(matches!(
            frame_index_from_reference(reference),
            Err(ChapterizeError::InvalidFrameReference(_))
        ));
    }
}

// ── Prediction records ─────────────────────────────────────────────

#[test]
fn records_become_classification_results() {
    let input = format!(
        "{}\n\n{}\n",
        record("talk/31.png", &["slides", "speaker"], &[0.9, 0.1]),
        record("talk/1.png", &["slides", "speaker"], &[0.2, 0.8]),
    );
    let results = parse_predictions(Cursor::new(input)).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].frame_index, 31);
    assert_eq!(results[0].labels[0].name, "slides");
    assert_eq!(results[0].labels[0].confidence, 0.9);
    assert_eq!(results[1].top_label().unwrap().name, "speaker");
}

#[test]
fn mismatched_arrays_are_malformed() {
    let input = record("talk/1.png", &["slides", "speaker"], &[0.9]);
    match parse_predictions(Cursor::new(input)) {
        Err(ChapterizeError::MalformedResult { frame_index, .. }) => {
            assert_eq!(frame_index, Some(1));
        }
        other => panic!("Expected MalformedResult, got: {other:?}"),
    }
}

#[test]
fn invalid_json_is_reported() {
    let result = parse_predictions(Cursor::new("{not json}\n"));
    assert!(matches!(result, Err(ChapterizeError::JsonError(_))));
}

// ── Prediction directories ─────────────────────────────────────────

#[test]
fn read_predictions_walks_nested_jsonl_files() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let nested = directory.path().join("prediction-model-2024");
    fs::create_dir_all(&nested).unwrap();

    fs::write(
        nested.join("predictions_00001.jsonl"),
        record("talk/61.png", &["slides"], &[1.0]),
    )
    .unwrap();
    fs::write(
        directory.path().join("predictions_00000.jsonl"),
        format!(
            "{}\n{}\n",
            record("talk/1.png", &["speaker"], &[1.0]),
            record("talk/31.png", &["speaker"], &[1.0]),
        ),
    )
    .unwrap();
    fs::write(directory.path().join("notes.txt"), "ignored").unwrap();

    let results = read_predictions(directory.path()).unwrap();
    let mut indices: Vec<u64> = results.iter().map(|r| r.frame_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![1, 31, 61]);

    let chapters = chapterize::merge_chapters(&results, 30.0, &MergeOptions::new()).unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].display_name, "speaker");
    assert_eq!(chapters[1].display_name, "slides");
}

#[test]
fn read_predictions_of_missing_directory_fails() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let result = read_predictions(directory.path().join("missing"));
    assert!(matches!(result, Err(ChapterizeError::IoError(_))));
}

#[test]
fn prediction_directory_reads_per_video_subdirectory() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let talk = directory.path().join("talk");
    fs::create_dir_all(&talk).unwrap();
    fs::write(
        talk.join("predictions.jsonl"),
        record("talk/1.png", &["speaker", "slides"], &[0.6, 0.4]),
    )
    .unwrap();

    let classifier = PredictionDirectory::new(directory.path());
    assert_eq!(classifier.directory_for("talk"), talk);

    let frames = vec![FrameReference {
        index: 1,
        uri: "talk/1.png".to_string(),
    }];
    let request = ClassificationRequest {
        video_id: "talk",
        frames: &frames,
        manifest: None,
    };
    let results = classifier.classify(&request).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].frame_index, 1);
}
