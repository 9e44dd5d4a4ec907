//! Local file source and sink.
//!
//! The file source MUST NOT fetch remote URLs. Output names combine the
//! source stem, a millisecond timestamp and random bytes so that two requests
//! for the same upload never write the same file.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use image::ImageFormat;
use rand::RngCore;

use crate::error::PipelineError;
use crate::frame::{self, Image};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_supported_format(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

fn is_local_file_path(path: &Path) -> bool {
    let raw = path.to_string_lossy();
    !raw.trim().is_empty() && !raw.contains("://")
}

/// Decode an image file into 8-bit RGB.
pub fn load_image(path: &Path) -> Result<Image> {
    if !is_local_file_path(path) {
        return Err(PipelineError::image_load(format!(
            "{} is not a local file path",
            path.display()
        ))
        .into());
    }
    if !is_supported_format(path) {
        return Err(PipelineError::image_load(format!(
            "unsupported image format for {} (expected one of {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        ))
        .into());
    }
    let bytes = std::fs::read(path).map_err(|e| {
        PipelineError::image_load(format!("could not load image {}: {}", path.display(), e))
    })?;
    decode_image(&bytes).with_context(|| format!("could not load image {}", path.display()))
}

/// Decode encoded image bytes into 8-bit RGB. The format is sniffed from the content.
pub fn decode_image(bytes: &[u8]) -> Result<Image> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::image_load(format!("could not decode image: {}", e)))?;
    let rgb = decoded.to_rgb8();
    frame::ensure_non_empty(&rgb)?;
    Ok(rgb)
}

/// Encode `image` to `path`; the format follows the path's extension.
pub fn save_image(image: &Image, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| anyhow!("cannot infer output format for {}: {}", path.display(), e))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    image
        .save_with_format(path, format)
        .with_context(|| format!("writing {}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// `{output_dir}/{stem}_{epoch_ms}_{8 hex}_{suffix}.{ext}`.
///
/// Unsupported or missing source extensions fall back to PNG.
pub fn unique_output_path(output_dir: &Path, source: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    let ext = extension_of(source)
        .filter(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "png".to_string());
    let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let mut nonce = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut nonce);
    Ok(output_dir.join(format!(
        "{}_{}_{}_{}.{}",
        stem,
        millis,
        hex::encode(nonce),
        suffix,
        ext
    )))
}
