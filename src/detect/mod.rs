//! Detection post-processing: classification, filtering, annotation and
//! per-image summaries for raw boxes from an external detector.

mod annotate;
mod backend;
pub mod backends;
pub mod font;
mod nms;
mod params;
mod processor;
mod result;
mod taxonomy;

pub use annotate::{annotate, label_for};
pub use backend::{collect_raw, DetectorBackend};
pub use backends::{ReplayBackend, SidecarBackend};
pub use nms::suppress;
pub use params::DetectionParams;
pub use processor::DetectionResultProcessor;
pub use result::{
    BoundingBox, Detection, ProcessedDetections, RawDetection, ThreatSummary, TypeCounts,
};
pub use taxonomy::{catalogue, Severity, ThreatType, ThreatTypeInfo};
