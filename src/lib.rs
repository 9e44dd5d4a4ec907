//! Tidewatch
//!
//! Underwater image enhancement, image quality scoring and maritime threat
//! reporting.
//!
//! # Architecture
//!
//! Per-image work is pure and synchronous:
//!
//! 1. **Enhance**: colour restoration, CLAHE on Lab lightness, dehaze, sharpen.
//! 2. **Score**: PSNR, SSIM and UIQM for the original/enhanced pair.
//! 3. **Detect**: raw boxes from an external detector are classified,
//!    filtered, drawn and summarized.
//! 4. **Analyze**: detections from many images are aggregated into a
//!    pattern report.
//!
//! Concurrency lives only in [`batch::WorkerPool`], owned by the caller.
//!
//! # Module Structure
//!
//! - `frame`, `colorspace`: pixel buffers and colour conversions
//! - `ingest`: local image files in and out
//! - `enhance`, `metrics`, `detect`, `analysis`: the processing stages
//! - `workflow`, `batch`: per-image orchestration and fan-out
//! - `config`, `error`, `ui`: ambient concerns

use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod analysis;
pub mod batch;
pub mod colorspace;
pub mod config;
pub mod detect;
pub mod enhance;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod metrics;
pub mod ui;
pub mod workflow;

pub use analysis::{analyze, PatternReport, RiskLevel};
pub use batch::{run_batch, BatchItemOutcome, BatchReport, WorkerPool};
pub use config::TidewatchConfig;
pub use detect::{
    Detection, DetectionParams, DetectionResultProcessor, DetectorBackend, RawDetection,
    Severity, ThreatSummary, ThreatType,
};
pub use enhance::{EnhancementParams, EnhancementPipeline, EnhancementResult};
pub use error::{ErrorKind, PipelineError};
pub use frame::{Image, UnitImage};
pub use metrics::{evaluate, QualityGrade, QualityMetrics, QualityReport};
pub use workflow::{ImageReport, Workflow};

/// Seconds since the Unix epoch.
pub(crate) fn now_s() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
