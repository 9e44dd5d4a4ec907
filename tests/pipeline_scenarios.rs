//! End-to-end behaviour of the processing stages.
//!
//! These tests verify that:
//! 1. Enhancement keeps dimensions and colour restoration boosts red
//! 2. Metrics tolerate mismatched dimensions and score identical images maximally
//! 3. An empty detector result leaves the image untouched
//! 4. Pattern analysis aggregates severities, types and ties as documented

use image::Rgb;
use tidewatch::analysis::{self, RiskLevel};
use tidewatch::detect::{BoundingBox, DetectionResultProcessor, RawDetection, ThreatSummary};
use tidewatch::enhance::{ColorRestorer, EnhancementStage};
use tidewatch::frame;
use tidewatch::{evaluate, Detection, EnhancementPipeline, Image, ThreatType};

fn underwater_scene(width: u32, height: u32) -> Image {
    Image::from_fn(width, height, |x, y| {
        let ripple = ((x * 5 + y * 3) % 32) as u8;
        Rgb([12 + ripple / 2, 70 + ripple, 95 + ripple])
    })
}

fn detection(threat_type: ThreatType, confidence: f64) -> Detection {
    let bbox = BoundingBox::new(10.0, 10.0, 40.0, 30.0).unwrap();
    Detection::new(threat_type, confidence, bbox).unwrap()
}

#[test]
fn enhancement_keeps_shape_and_changes_pixels() {
    let original = underwater_scene(96, 64);
    let enhanced = EnhancementPipeline::default().enhance(&original).unwrap();
    assert_eq!(enhanced.dimensions(), original.dimensions());
    assert_ne!(enhanced, original);
}

#[test]
fn colour_restoration_lifts_red() {
    let unit = frame::to_unit(&underwater_scene(32, 32));
    let restored = ColorRestorer::default().apply(&unit);
    let red_before = frame::channel_mean(&unit, frame::RED);
    let red_after = frame::channel_mean(&restored, frame::RED);
    assert!(red_after > red_before);
    assert!(restored.pixels().all(|p| p.0.iter().all(|c| (0.0..=1.0).contains(c))));
}

#[test]
fn identical_images_have_infinite_psnr_and_unit_ssim() {
    let image = underwater_scene(40, 40);
    let m = evaluate(&image, &image).unwrap();
    assert!(m.psnr.is_infinite());
    assert!((m.ssim - 1.0).abs() < 1e-9);
    assert!(m.uiqm >= 0.0);
}

#[test]
fn metrics_succeed_for_different_dimensions() {
    let original = underwater_scene(64, 48);
    let enhanced = EnhancementPipeline::default()
        .enhance(&underwater_scene(128, 96))
        .unwrap();
    let m = evaluate(&original, &enhanced).unwrap();
    assert!(m.psnr >= 0.0);
    assert!((-1.0..=1.0).contains(&m.ssim));
}

#[test]
fn empty_raw_detections_leave_image_bit_identical() {
    let image = underwater_scene(80, 60);
    let out = DetectionResultProcessor::default().process(&image, &[]);
    assert_eq!(out.summary, ThreatSummary::default());
    assert_eq!(out.annotated, image);

    let json = serde_json::to_value(&out.summary).unwrap();
    assert_eq!(json["total_threats"], 0);
    assert_eq!(json["threat_types"], serde_json::json!({}));
}

#[test]
fn raw_detections_become_an_annotated_summary() {
    let image = underwater_scene(160, 120);
    let raw = vec![
        RawDetection::new(0, 0.92, [20.0, 30.0, 80.0, 70.0]),
        RawDetection::new(1, 0.81, [100.0, 40.0, 130.0, 70.0]),
        RawDetection::new(42, 0.64, [5.0, 90.0, 25.0, 110.0]),
    ];
    let out = DetectionResultProcessor::default().process(&image, &raw);
    assert_eq!(out.summary.total_threats, 3);
    assert_eq!(out.summary.critical_threats, 2);
    assert_eq!(out.summary.medium_threats, 1);
    for d in &out.detections {
        let b = d.bbox();
        assert_eq!(d.area(), (b.x2() - b.x1()) * (b.y2() - b.y1()));
        assert_eq!(d.severity(), d.threat_type().severity());
    }
    assert_ne!(out.annotated, image);
}

#[test]
fn pattern_analysis_of_mixed_threats() {
    let detections = vec![
        detection(ThreatType::Submarine, 0.89),
        detection(ThreatType::Diver, 0.6),
        detection(ThreatType::Diver, 0.55),
    ];
    let report = analysis::analyze(&detections);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(
        json["severity_distribution"],
        serde_json::json!({"critical": 1, "high": 2, "medium": 0})
    );
    assert_eq!(
        json["threat_distribution"],
        serde_json::json!({"submarine": 1, "diver": 2})
    );
    assert_eq!(json["most_common_threat"]["type"], "diver");
    assert_eq!(json["risk_level"], "high");
    assert_eq!(report.patterns().unwrap().risk_level, RiskLevel::High);
}

#[test]
fn pattern_analysis_tie_goes_to_first_seen() {
    let detections = vec![
        detection(ThreatType::Drone, 0.7),
        detection(ThreatType::SuspiciousObject, 0.9),
    ];
    let report = analysis::analyze(&detections);
    let p = report.patterns().unwrap();
    assert_eq!(p.most_common_threat.threat_type, ThreatType::Drone);
    assert_eq!(p.most_common_threat.count, 1);
    assert_eq!(p.risk_level, RiskLevel::Medium);
}

#[test]
fn pattern_analysis_of_nothing_says_so() {
    let none: Vec<Detection> = Vec::new();
    let json = serde_json::to_value(analysis::analyze(&none)).unwrap();
    assert_eq!(json, serde_json::json!({"pattern_summary": "No threats detected"}));
}
