use std::convert::TryFrom;

use anyhow::{anyhow, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::taxonomy::{Severity, ThreatType};
use crate::frame::Image;

/// One box as the external detector emits it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: i64,
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn new(class_id: i64, confidence: f64, bbox: [f32; 4]) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// Axis-aligned box with `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(anyhow!("non-finite box [{x1}, {y1}, {x2}, {y2}]"));
        }
        if x2 <= x1 || y2 <= y1 {
            return Err(anyhow!("degenerate box [{x1}, {y1}, {x2}, {y2}]"));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn from_corners(corners: [f32; 4]) -> Result<Self> {
        let [x1, y1, x2, y2] = corners;
        Self::new(x1, y1, x2, y2)
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// A classified detection. Severity and area are always derived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DetectionRecord")]
pub struct Detection {
    threat_type: ThreatType,
    confidence: f64,
    severity: Severity,
    bbox: BoundingBox,
    area: f32,
}

impl Detection {
    pub fn new(threat_type: ThreatType, confidence: f64, bbox: BoundingBox) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!("confidence {confidence} outside [0, 1]"));
        }
        Ok(Self {
            threat_type,
            confidence,
            severity: threat_type.severity(),
            area: bbox.area(),
            bbox,
        })
    }

    /// Classify a raw detector box.
    pub fn from_raw(raw: &RawDetection) -> Result<Self> {
        let bbox = BoundingBox::from_corners(raw.bbox)?;
        Self::new(ThreatType::from_class_id(raw.class_id), raw.confidence, bbox)
    }

    pub fn threat_type(&self) -> ThreatType {
        self.threat_type
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn area(&self) -> f32 {
        self.area
    }
}

/// Wire form of a detection. Any supplied severity or area is ignored.
#[derive(Deserialize)]
struct DetectionRecord {
    threat_type: ThreatType,
    confidence: f64,
    bbox: BoundingBox,
}

impl TryFrom<DetectionRecord> for Detection {
    type Error = anyhow::Error;

    fn try_from(record: DetectionRecord) -> Result<Self> {
        Detection::new(record.threat_type, record.confidence, record.bbox)
    }
}

impl<'de> Deserialize<'de> for BoundingBox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Corners {
            x1: f32,
            y1: f32,
            x2: f32,
            y2: f32,
        }
        let c = Corners::deserialize(deserializer)?;
        BoundingBox::new(c.x1, c.y1, c.x2, c.y2).map_err(serde::de::Error::custom)
    }
}

/// Counts keyed by threat type in first-encountered order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeCounts(Vec<(ThreatType, usize)>);

impl TypeCounts {
    pub fn tally<'a>(types: impl IntoIterator<Item = &'a ThreatType>) -> Self {
        let mut counts: Vec<(ThreatType, usize)> = Vec::new();
        for t in types {
            match counts.iter_mut().find(|(seen, _)| seen == t) {
                Some((_, n)) => *n += 1,
                None => counts.push((*t, 1)),
            }
        }
        Self(counts)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ThreatType, usize)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest count; ties go to the type seen first.
    pub fn most_common(&self) -> Option<(ThreatType, usize)> {
        self.0
            .iter()
            .copied()
            .fold(None, |best, (t, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((t, n)),
            })
    }
}

impl Serialize for TypeCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (t, n) in &self.0 {
            map.serialize_entry(t, n)?;
        }
        map.end()
    }
}

/// Per-image tallies, derived from a detection slice.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ThreatSummary {
    pub total_threats: usize,
    pub critical_threats: usize,
    pub high_threats: usize,
    pub medium_threats: usize,
    pub threat_types: TypeCounts,
}

impl ThreatSummary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let count = |s: Severity| detections.iter().filter(|d| d.severity == s).count();
        Self {
            total_threats: detections.len(),
            critical_threats: count(Severity::Critical),
            high_threats: count(Severity::High),
            medium_threats: count(Severity::Medium),
            threat_types: TypeCounts::tally(detections.iter().map(|d| &d.threat_type)),
        }
    }
}

/// Output of [`super::DetectionResultProcessor::process`].
#[derive(Clone, Debug)]
pub struct ProcessedDetections {
    pub annotated: Image,
    pub detections: Vec<Detection>,
    pub summary: ThreatSummary,
    /// Raw entries dropped because their box or confidence was invalid.
    pub rejected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(t: ThreatType, conf: f64, bbox: [f32; 4]) -> Detection {
        Detection::new(t, conf, BoundingBox::from_corners(bbox).unwrap()).unwrap()
    }

    #[test]
    fn area_and_severity_are_derived() {
        let d = Detection::from_raw(&RawDetection::new(0, 0.92, [100.0, 100.0, 200.0, 180.0]))
            .unwrap();
        assert_eq!(d.threat_type(), ThreatType::Submarine);
        assert_eq!(d.severity(), Severity::Critical);
        assert_eq!(d.area(), 8000.0);
    }

    #[test]
    fn degenerate_and_non_finite_boxes_are_rejected() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_err());
        assert!(BoundingBox::new(10.0, 30.0, 20.0, 20.0).is_err());
        assert!(BoundingBox::new(f32::NAN, 0.0, 5.0, 5.0).is_err());
        assert!(Detection::from_raw(&RawDetection::new(1, 1.5, [0.0, 0.0, 1.0, 1.0])).is_err());
    }

    #[test]
    fn iou_of_overlapping_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0).unwrap();
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        let far = BoundingBox::new(100.0, 100.0, 110.0, 110.0).unwrap();
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn deserialization_recomputes_severity() {
        let json = r#"{"threat_type":"diver","confidence":0.7,"severity":"critical",
                       "bbox":{"x1":0,"y1":0,"x2":4,"y2":5},"area":1}"#;
        let d: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(d.severity(), Severity::High);
        assert_eq!(d.area(), 20.0);
    }

    #[test]
    fn summary_counts_preserve_first_seen_order() {
        let detections = vec![
            det(ThreatType::Diver, 0.8, [0.0, 0.0, 1.0, 1.0]),
            det(ThreatType::Mine, 0.9, [0.0, 0.0, 1.0, 1.0]),
            det(ThreatType::Diver, 0.6, [0.0, 0.0, 1.0, 1.0]),
        ];
        let summary = ThreatSummary::from_detections(&detections);
        assert_eq!(summary.total_threats, 3);
        assert_eq!(summary.critical_threats, 1);
        assert_eq!(summary.high_threats, 2);
        assert_eq!(summary.medium_threats, 0);
        let order: Vec<_> = summary.threat_types.iter().collect();
        assert_eq!(order, vec![(ThreatType::Diver, 2), (ThreatType::Mine, 1)]);
        let json = serde_json::to_string(&summary.threat_types).unwrap();
        assert_eq!(json, r#"{"diver":2,"mine":1}"#);
    }

    #[test]
    fn most_common_breaks_ties_by_first_seen() {
        let counts = TypeCounts::tally(&[
            ThreatType::Mine,
            ThreatType::Diver,
            ThreatType::Diver,
            ThreatType::Mine,
        ]);
        assert_eq!(counts.most_common(), Some((ThreatType::Mine, 2)));
        assert_eq!(TypeCounts::default().most_common(), None);
    }
}
