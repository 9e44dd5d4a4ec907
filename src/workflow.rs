//! Per-image orchestration: enhance, score, detect, annotate, persist.
//!
//! A `Workflow` holds only plain values and an explicit detector handle, so
//! one instance can be shared by every batch worker.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::TidewatchConfig;
use crate::detect::{
    collect_raw, Detection, DetectionResultProcessor, DetectorBackend, ThreatSummary,
};
use crate::enhance::{EnhancementPipeline, EnhancementResult};
use crate::frame::Image;
use crate::ingest;
use crate::metrics::{self, QualityReport, QualityThresholds};

#[derive(Clone, Debug, Serialize)]
pub struct EnhanceReport {
    #[serde(flatten)]
    pub result: EnhancementResult,
    /// Absent when metrics could not be computed; see `metrics_error`.
    pub quality: Option<QualityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DetectReport {
    pub source_path: PathBuf,
    pub annotated_path: Option<PathBuf>,
    pub detections: Vec<Detection>,
    pub threat_summary: ThreatSummary,
    pub rejected_detections: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageReport {
    pub enhancement: EnhanceReport,
    pub detection: DetectReport,
}

pub struct Workflow {
    pipeline: EnhancementPipeline,
    processor: DetectionResultProcessor,
    detector: Option<Box<dyn DetectorBackend>>,
    thresholds: QualityThresholds,
    output_dir: Option<PathBuf>,
}

impl Workflow {
    pub fn new(
        pipeline: EnhancementPipeline,
        processor: DetectionResultProcessor,
        detector: Option<Box<dyn DetectorBackend>>,
        thresholds: QualityThresholds,
        output_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            processor,
            detector,
            thresholds,
            output_dir,
        }
    }

    pub fn from_config(
        config: &TidewatchConfig,
        detector: Option<Box<dyn DetectorBackend>>,
    ) -> Result<Self> {
        config.enhancement.validate()?;
        if let Some(backend) = &detector {
            backend
                .warm_up()
                .with_context(|| format!("warming up {} detector", backend.name()))?;
            log::info!("detector backend: {}", backend.name());
        }
        let processor = DetectionResultProcessor::new(config.detection.params.clone())?;
        let output_dir = config
            .output
            .write_images
            .then(|| config.output.dir.clone());
        Ok(Self::new(
            EnhancementPipeline::new(&config.enhancement),
            processor,
            detector,
            config.quality.clone(),
            output_dir,
        ))
    }

    /// Enhance `source`, score the result and write it when an output
    /// directory is configured.
    pub fn enhance(&self, source: &Path) -> Result<EnhanceReport> {
        let original = ingest::load_image(source)?;
        self.enhance_loaded(source, &original)
    }

    /// Detect on `source`, optionally enhancing it first.
    pub fn detect(&self, source: &Path, enhance_first: bool) -> Result<DetectReport> {
        let original = ingest::load_image(source)?;
        if enhance_first {
            let enhanced = self
                .pipeline
                .enhance(&original)
                .with_context(|| format!("enhancing {}", source.display()))?;
            self.detect_loaded(source, &enhanced)
        } else {
            self.detect_loaded(source, &original)
        }
    }

    /// Full chain for one image. Detection runs on the enhanced frame.
    pub fn process(&self, source: &Path) -> Result<ImageReport> {
        let original = ingest::load_image(source)?;
        let enhancement = self.enhance_loaded(source, &original)?;
        let detection = self.detect_loaded(source, &enhancement.result.enhanced)?;
        log::info!(
            "{}: {} threats ({} critical)",
            source.display(),
            detection.threat_summary.total_threats,
            detection.threat_summary.critical_threats
        );
        Ok(ImageReport {
            enhancement,
            detection,
        })
    }

    fn enhance_loaded(&self, source: &Path, original: &Image) -> Result<EnhanceReport> {
        let mut result = self.pipeline.enhance_source(source, original)?;

        let (quality, metrics_error) = match metrics::evaluate(original, &result.enhanced) {
            Ok(m) => (Some(QualityReport::new(m, &self.thresholds)), None),
            Err(err) => {
                log::warn!("metrics unavailable for {}: {:#}", source.display(), err);
                (None, Some(format!("{err:#}")))
            }
        };

        if let Some(dir) = &self.output_dir {
            result.persist(dir)?;
        }
        Ok(EnhanceReport {
            result,
            quality,
            metrics_error,
        })
    }

    fn detect_loaded(&self, source: &Path, image: &Image) -> Result<DetectReport> {
        let raw = collect_raw(self.detector.as_deref(), image, source)
            .with_context(|| format!("detector output for {}", source.display()))?;
        let processed = self.processor.process(image, &raw);

        let annotated_path = match &self.output_dir {
            Some(dir) => {
                let path = ingest::unique_output_path(dir, source, "detected")?;
                ingest::save_image(&processed.annotated, &path)?;
                Some(path)
            }
            None => None,
        };

        Ok(DetectReport {
            source_path: source.to_path_buf(),
            annotated_path,
            detections: processed.detections,
            threat_summary: processed.summary,
            rejected_detections: processed.rejected,
        })
    }
}
