//! Quality metrics for an original/enhanced pair.
//!
//! - PSNR in dB over all samples (`+inf` for identical images)
//! - mean SSIM over the three channels
//! - UIQM, a colourfulness/sharpness/contrast composite of the enhanced image
//!
//! When dimensions differ, the enhanced image is resized to the original's
//! size first. That normalization is lossy but never an error.

mod grade;
mod ssim;
mod uiqm;

pub use grade::{QualityGrade, QualityReport, QualityThresholds};
pub use ssim::ssim;
pub use uiqm::{colorfulness, contrast, sharpness, uiqm};

use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use serde::{Serialize, Serializer};

use crate::error::{ErrorKind, PipelineError};
use crate::frame::{self, Image};
use crate::ingest;

const MAX_SAMPLE: f64 = 255.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct QualityMetrics {
    /// dB; infinite when the images are identical (serialized as `null`).
    #[serde(serialize_with = "finite_or_null")]
    pub psnr: f64,
    pub ssim: f64,
    pub uiqm: f64,
}

fn finite_or_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Compare an original and an enhanced image.
pub fn evaluate(original: &Image, enhanced: &Image) -> Result<QualityMetrics> {
    frame::ensure_non_empty(original)
        .map_err(|e| PipelineError::metrics(format!("original image: {e}")))?;
    frame::ensure_non_empty(enhanced)
        .map_err(|e| PipelineError::metrics(format!("enhanced image: {e}")))?;

    let resized;
    let enhanced = if enhanced.dimensions() != original.dimensions() {
        resized = match_dimensions(enhanced, original.width(), original.height())?;
        &resized
    } else {
        enhanced
    };

    let metrics = QualityMetrics {
        psnr: psnr(original, enhanced),
        ssim: ssim(original, enhanced),
        uiqm: uiqm(enhanced),
    };
    log::debug!(
        "metrics psnr={:.2} ssim={:.4} uiqm={:.4}",
        metrics.psnr,
        metrics.ssim,
        metrics.uiqm
    );
    Ok(metrics)
}

/// Load both images from disk and compare them.
///
/// Any decode failure is reported as a `MetricsComputation` error.
pub fn evaluate_files(original: &Path, enhanced: &Path) -> Result<QualityMetrics> {
    let load = |path: &Path| {
        ingest::load_image(path).map_err(|e| {
            PipelineError::metrics(format!("could not load {} for metrics: {:#}", path.display(), e))
        })
    };
    let original_image = load(original)?;
    let enhanced_image = load(enhanced)?;
    evaluate(&original_image, &enhanced_image)
        .with_context(|| format!("metrics for {}", original.display()))
}

/// Bilinear resize of `image` to `width`×`height`.
fn match_dimensions(image: &Image, width: u32, height: u32) -> Result<Image> {
    if width == 0 || height == 0 {
        return Err(PipelineError::new(
            ErrorKind::ShapeMismatch,
            format!("cannot resize {:?} to {}x{}", image.dimensions(), width, height),
        )
        .into());
    }
    log::debug!(
        "resizing enhanced image {:?} -> {}x{} before comparison",
        image.dimensions(),
        width,
        height
    );
    Ok(imageops::resize(image, width, height, FilterType::Triangle))
}

/// Peak signal-to-noise ratio for 8-bit images of equal size.
pub fn psnr(a: &Image, b: &Image) -> f64 {
    let samples = a.as_raw().len();
    if samples == 0 {
        return f64::INFINITY;
    }
    let sse: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    let mse = sse / samples as f64;
    if mse == 0.0 {
        return f64::INFINITY;
    }
    10.0 * (MAX_SAMPLE * MAX_SAMPLE / mse).log10()
}
