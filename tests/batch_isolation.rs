use std::fs;
use std::path::{Path, PathBuf};

use image::Rgb;
use tempfile::tempdir;

use tidewatch::batch::{run_batch, run_each, BatchItemOutcome, WorkerPool};
use tidewatch::detect::{DetectionResultProcessor, SidecarBackend};
use tidewatch::error::{ErrorKind, PipelineError};
use tidewatch::ingest;
use tidewatch::metrics::QualityThresholds;
use tidewatch::{EnhancementPipeline, Image, Workflow};

fn write_frame(dir: &Path, name: &str, shade: u8) -> PathBuf {
    let image = Image::from_fn(64, 48, |x, y| {
        Rgb([shade / 4 + (x % 8) as u8, shade + (y % 16) as u8, 120 + ((x + y) % 24) as u8])
    });
    let path = dir.join(name);
    ingest::save_image(&image, &path).expect("write frame");
    path
}

fn write_sidecar(image: &Path, json: &str) {
    let name = format!(
        "{}.detections.json",
        image.file_name().unwrap().to_string_lossy()
    );
    fs::write(image.with_file_name(name), json).expect("write sidecar");
}

fn workflow(output: &Path) -> Workflow {
    Workflow::new(
        EnhancementPipeline::default(),
        DetectionResultProcessor::default(),
        Some(Box::new(SidecarBackend::beside_images())),
        QualityThresholds::default(),
        Some(output.to_path_buf()),
    )
}

#[test]
fn corrupt_item_fails_alone_and_order_is_kept() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let first = write_frame(dir.path(), "frame_01.png", 60);
    write_sidecar(
        &first,
        r#"[{"class_id": 0, "confidence": 0.9, "bbox": [4, 4, 30, 20]},
            {"class_id": 2, "confidence": 0.6, "bbox": [35, 10, 50, 40]}]"#,
    );
    let broken = dir.path().join("frame_02.png");
    fs::write(&broken, b"definitely not a png").unwrap();
    let third = write_frame(dir.path(), "frame_03.png", 80);
    write_sidecar(
        &third,
        r#"[{"class_id": 2, "confidence": 0.75, "bbox": [10, 10, 20, 30]}]"#,
    );
    let fourth = write_frame(dir.path(), "frame_04.png", 90);

    let inputs = vec![first.clone(), broken.clone(), third.clone(), fourth.clone()];
    let pool = WorkerPool::new(3).unwrap();
    let mut seen = 0;
    let report = run_batch(&workflow(&out), &pool, &inputs, 20, |_| seen += 1).unwrap();

    assert_eq!(seen, 4);
    assert_eq!(report.total_images, 4);
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 1);

    let order: Vec<&PathBuf> = report
        .image_results
        .iter()
        .map(|o| match o {
            BatchItemOutcome::Completed { input, .. } => input,
            BatchItemOutcome::Failed { input, .. } => input,
        })
        .collect();
    assert_eq!(order, vec![&first, &broken, &third, &fourth]);

    match &report.image_results[1] {
        BatchItemOutcome::Failed { code, .. } => assert_eq!(*code, "IMAGE_LOAD"),
        other => panic!("expected failure, got {other:?}"),
    }

    let fourth_report = report.image_results[3].report().unwrap();
    assert_eq!(fourth_report.detection.threat_summary.total_threats, 0);

    let patterns = report.pattern_analysis.patterns().unwrap();
    assert_eq!(report.total_threats, 3);
    assert_eq!(patterns.severity_distribution.critical, 1);
    assert_eq!(patterns.severity_distribution.high, 2);
    assert_eq!(patterns.most_common_threat.count, 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["image_results"][1]["status"], "failed");
    assert_eq!(json["image_results"][0]["status"], "completed");
    assert_eq!(json["pattern_analysis"]["risk_level"], "high");
}

#[test]
fn enhancing_many_images_survives_a_bad_one() {
    let dir = tempdir().unwrap();
    let good_a = write_frame(dir.path(), "good_a.png", 40);
    let bad_b = dir.path().join("bad_b.png");
    fs::write(&bad_b, b"not an image either").unwrap();
    let good_c = write_frame(dir.path(), "good_c.png", 100);

    let wf = Workflow::new(
        EnhancementPipeline::default(),
        DetectionResultProcessor::default(),
        None,
        QualityThresholds::default(),
        None,
    );
    let pool = WorkerPool::new(2).unwrap();
    let inputs = vec![good_a.clone(), bad_b.clone(), good_c.clone()];
    let outcomes = run_each(&pool, &inputs, |input| wf.enhance(input), |_| {});

    assert_eq!(outcomes.len(), 3);
    let a = outcomes[0].report().expect("good_a enhanced");
    assert_eq!(a.result.source_path, good_a);
    assert!(a.result.output_path.is_none());
    assert_eq!(outcomes[1].input(), bad_b.as_path());
    match &outcomes[1] {
        BatchItemOutcome::Failed { code, error, .. } => {
            assert_eq!(*code, "IMAGE_LOAD");
            assert!(error.contains("bad_b.png"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(outcomes[2].report().unwrap().result.source_path, good_c);

    let json = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(json[0]["status"], "completed");
    assert_eq!(json[0]["width"], 64);
    assert_eq!(json[1]["status"], "failed");
}

#[test]
fn oversized_batch_is_rejected_up_front() {
    let dir = tempdir().unwrap();
    let inputs: Vec<PathBuf> = (0..3)
        .map(|i| dir.path().join(format!("frame_{i}.png")))
        .collect();
    let pool = WorkerPool::new(2).unwrap();
    let err = run_batch(&workflow(dir.path()), &pool, &inputs, 2, |_| {}).unwrap_err();
    assert_eq!(
        PipelineError::kind_of(&err),
        Some(ErrorKind::InvalidParameters)
    );
}

#[test]
fn batch_without_threats_reports_none() {
    let dir = tempdir().unwrap();
    let inputs = vec![
        write_frame(dir.path(), "calm_a.png", 50),
        write_frame(dir.path(), "calm_b.png", 70),
    ];
    let pool = WorkerPool::new(2).unwrap();
    let report = run_batch(&workflow(&dir.path().join("out")), &pool, &inputs, 20, |_| {})
        .unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.total_threats, 0);
    assert!(report.pattern_analysis.patterns().is_none());
    let json = serde_json::to_value(&report.pattern_analysis).unwrap();
    assert_eq!(json["pattern_summary"], "No threats detected");
}
