use std::cmp::Ordering;

use super::result::Detection;

/// Class-aware greedy non-maximum suppression.
///
/// Returns indices into `detections` of the survivors, highest confidence
/// first. A box is suppressed when it overlaps an already kept box of the
/// same threat type with IoU above `iou_threshold`.
pub fn suppress(detections: &[Detection], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| {
        detections[b]
            .confidence()
            .partial_cmp(&detections[a].confidence())
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for idx in order {
        let candidate = &detections[idx];
        let overlaps = kept.iter().any(|&k| {
            let other = &detections[k];
            other.threat_type() == candidate.threat_type()
                && other.bbox().iou(candidate.bbox()) > iou_threshold
        });
        if !overlaps {
            kept.push(idx);
        }
    }
    kept
}
