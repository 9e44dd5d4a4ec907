use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::error::{ErrorKind, PipelineError};
use crate::frame::Image;

/// File name suffix of per-image detector output.
pub const SIDECAR_SUFFIX: &str = ".detections.json";

/// Parse a JSON array of raw detections.
pub fn parse_raw(json: &str) -> Result<Vec<RawDetection>> {
    serde_json::from_str(json)
        .context("raw detections must be a JSON array of {class_id, confidence, bbox}")
}

pub fn read_raw(path: &Path) -> Result<Vec<RawDetection>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read detections {}", path.display()))?;
    parse_raw(&contents).with_context(|| format!("failed to parse detections {}", path.display()))
}

/// Serves the same pre-computed detections for every image.
pub struct ReplayBackend {
    detections: Vec<RawDetection>,
}

impl ReplayBackend {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self { detections }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(read_raw(path)?))
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&self, _image: &Image, _source: &Path) -> Result<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }
}

/// Reads `<image file name>.detections.json` written by an external detector.
///
/// Sidecars are looked up beside the image unless a directory is given.
pub struct SidecarBackend {
    dir: Option<PathBuf>,
}

impl SidecarBackend {
    pub fn beside_images() -> Self {
        Self { dir: None }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn sidecar_path(&self, source: &Path) -> Option<PathBuf> {
        let file_name = source.file_name()?.to_string_lossy();
        let name = format!("{file_name}{SIDECAR_SUFFIX}");
        Some(match &self.dir {
            Some(dir) => dir.join(name),
            None => source.with_file_name(name),
        })
    }
}

impl DetectorBackend for SidecarBackend {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn warm_up(&self) -> Result<()> {
        match &self.dir {
            Some(dir) if !dir.is_dir() => Err(PipelineError::invalid(format!(
                "sidecar directory {} does not exist",
                dir.display()
            ))
            .into()),
            _ => Ok(()),
        }
    }

    fn detect(&self, _image: &Image, source: &Path) -> Result<Vec<RawDetection>> {
        let path = self.sidecar_path(source).ok_or_else(|| {
            PipelineError::new(
                ErrorKind::DetectorUnavailable,
                format!("no sidecar name for {}", source.display()),
            )
        })?;
        if !path.is_file() {
            return Err(PipelineError::new(
                ErrorKind::DetectorUnavailable,
                format!("no detector output at {}", path.display()),
            )
            .into());
        }
        read_raw(&path)
    }
}
