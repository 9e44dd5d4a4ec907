use std::path::Path;

use anyhow::Result;

use super::result::RawDetection;
use crate::error::{ErrorKind, PipelineError};
use crate::frame::Image;

/// Source of raw detections for an image.
///
/// # Boundary
///
/// Model inference lives outside this crate. A backend hands the core a list
/// of raw boxes for an enhanced image and nothing else:
/// - It must not modify the image
/// - It must be callable from several worker threads at once
///
/// A backend with nothing to offer for an image returns a
/// `DetectorUnavailable` error; callers degrade that to an empty list.
pub trait DetectorBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Raw detections for `image`, which was loaded from `source`.
    fn detect(&self, image: &Image, source: &Path) -> Result<Vec<RawDetection>>;

    /// Checked once before any image is handed to `detect`.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

/// Ask `backend` for detections, treating an absent or unavailable detector
/// as "nothing detected". Any other backend failure is returned.
pub fn collect_raw(
    backend: Option<&dyn DetectorBackend>,
    image: &Image,
    source: &Path,
) -> Result<Vec<RawDetection>> {
    let Some(backend) = backend else {
        log::debug!("no detector configured for {}", source.display());
        return Ok(Vec::new());
    };
    match backend.detect(image, source) {
        Ok(raw) => {
            log::debug!(
                "{} produced {} raw detections for {}",
                backend.name(),
                raw.len(),
                source.display()
            );
            Ok(raw)
        }
        Err(err) if PipelineError::kind_of(&err) == Some(ErrorKind::DetectorUnavailable) => {
            log::warn!("{:#}; continuing without detections", err);
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Unavailable;

    impl DetectorBackend for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn detect(&self, _image: &Image, source: &Path) -> Result<Vec<RawDetection>> {
            Err(PipelineError::new(
                ErrorKind::DetectorUnavailable,
                format!("no output for {}", source.display()),
            )
            .into())
        }
    }

    struct Broken;

    impl DetectorBackend for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(&self, _image: &Image, _source: &Path) -> Result<Vec<RawDetection>> {
            Err(anyhow!("malformed detector output"))
        }
    }

    #[test]
    fn unavailable_detector_degrades_to_empty() {
        let image = Image::new(4, 4);
        let raw = collect_raw(Some(&Unavailable), &image, Path::new("a.png")).unwrap();
        assert!(raw.is_empty());
        assert!(collect_raw(None, &image, Path::new("a.png")).unwrap().is_empty());
    }

    #[test]
    fn other_failures_propagate() {
        let image = Image::new(4, 4);
        assert!(collect_raw(Some(&Broken), &image, Path::new("a.png")).is_err());
    }
}
