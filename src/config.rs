use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::batch::DEFAULT_MAX_BATCH;
use crate::detect::DetectionParams;
use crate::enhance::EnhancementParams;
use crate::metrics::QualityThresholds;

const DEFAULT_OUTPUT_DIR: &str = "enhanced";
const MAX_WORKERS: usize = 64;

#[derive(Debug, Deserialize, Default)]
struct TidewatchConfigFile {
    output: Option<OutputConfigFile>,
    enhancement: Option<EnhancementParams>,
    detection: Option<DetectionConfigFile>,
    quality: Option<QualityThresholds>,
    batch: Option<BatchConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    write_images: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f64>,
    nms_threshold: Option<f32>,
    max_detections: Option<usize>,
    sidecar_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct BatchConfigFile {
    workers: Option<usize>,
    max_images: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TidewatchConfig {
    pub output: OutputSettings,
    pub enhancement: EnhancementParams,
    pub detection: DetectionSettings,
    pub quality: QualityThresholds,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    /// When false, reports are produced but no image is written.
    pub write_images: bool,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub params: DetectionParams,
    /// Where detector sidecar files live; beside each image when unset.
    pub sidecar_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub workers: usize,
    pub max_images: usize,
}

impl Default for TidewatchConfig {
    fn default() -> Self {
        Self::from_file(TidewatchConfigFile::default())
    }
}

impl TidewatchConfig {
    /// Defaults, then the file named by `TIDEWATCH_CONFIG`, then environment
    /// overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TIDEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TidewatchConfigFile) -> Self {
        let output = OutputSettings {
            dir: file
                .output
                .as_ref()
                .and_then(|output| output.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            write_images: file
                .output
                .as_ref()
                .and_then(|output| output.write_images)
                .unwrap_or(true),
        };
        let defaults = DetectionParams::default();
        let detection = match file.detection {
            Some(d) => DetectionSettings {
                params: DetectionParams {
                    confidence_threshold: d
                        .confidence_threshold
                        .unwrap_or(defaults.confidence_threshold),
                    nms_threshold: d.nms_threshold.unwrap_or(defaults.nms_threshold),
                    max_detections: d.max_detections.unwrap_or(defaults.max_detections),
                },
                sidecar_dir: d.sidecar_dir,
            },
            None => DetectionSettings {
                params: defaults,
                sidecar_dir: None,
            },
        };
        let batch = BatchSettings {
            workers: file
                .batch
                .as_ref()
                .and_then(|batch| batch.workers)
                .unwrap_or_else(default_workers),
            max_images: file
                .batch
                .and_then(|batch| batch.max_images)
                .unwrap_or(DEFAULT_MAX_BATCH),
        };
        Self {
            output,
            enhancement: file.enhancement.unwrap_or_default(),
            detection,
            quality: file.quality.unwrap_or_default(),
            batch,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("TIDEWATCH_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = PathBuf::from(dir);
            }
        }
        if let Ok(value) = std::env::var("TIDEWATCH_CONFIDENCE_THRESHOLD") {
            self.detection.params.confidence_threshold = value.trim().parse().map_err(|_| {
                anyhow!("TIDEWATCH_CONFIDENCE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Ok(value) = std::env::var("TIDEWATCH_NMS_THRESHOLD") {
            self.detection.params.nms_threshold = value.trim().parse().map_err(|_| {
                anyhow!("TIDEWATCH_NMS_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Ok(value) = std::env::var("TIDEWATCH_MAX_DETECTIONS") {
            self.detection.params.max_detections = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("TIDEWATCH_MAX_DETECTIONS must be a positive integer"))?;
        }
        if let Ok(value) = std::env::var("TIDEWATCH_WORKERS") {
            self.batch.workers = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("TIDEWATCH_WORKERS must be a positive integer"))?;
        }
        if let Ok(value) = std::env::var("TIDEWATCH_MAX_BATCH") {
            self.batch.max_images = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("TIDEWATCH_MAX_BATCH must be a positive integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.enhancement.validate()?;
        self.detection.params.validate()?;
        if self.output.dir.as_os_str().is_empty() {
            return Err(anyhow!("output directory must not be empty"));
        }
        if self.batch.workers == 0 || self.batch.workers > MAX_WORKERS {
            return Err(anyhow!(
                "batch workers must be between 1 and {}, got {}",
                MAX_WORKERS,
                self.batch.workers
            ));
        }
        if self.batch.max_images == 0 {
            return Err(anyhow!("batch max_images must be greater than zero"));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(MAX_WORKERS))
        .unwrap_or(1)
}

fn read_config_file(path: &Path) -> Result<TidewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
