use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use super::{
    ColorRestorer, ContrastEnhancer, Dehazer, EnhancementParams, EnhancementStage, Sharpener,
};
use crate::frame::{self, Image, UnitImage};
use crate::ingest;

/// Enhanced frame plus provenance. The pixel buffer is not serialized.
#[derive(Clone, Debug, Serialize)]
pub struct EnhancementResult {
    #[serde(skip)]
    pub enhanced: Image,
    pub source_path: PathBuf,
    /// Seconds since the Unix epoch.
    pub produced_at: u64,
    pub width: u32,
    pub height: u32,
    /// Set once the enhanced image has been written to disk.
    pub output_path: Option<PathBuf>,
}

impl EnhancementResult {
    /// Write the enhanced image under `output_dir` with a unique name derived from the source.
    pub fn persist(&mut self, output_dir: &Path) -> Result<PathBuf> {
        let path = ingest::unique_output_path(output_dir, &self.source_path, "enhanced")?;
        ingest::save_image(&self.enhanced, &path)?;
        self.output_path = Some(path.clone());
        Ok(path)
    }
}

/// Fixed-order chain: colour restoration, CLAHE, dehaze, sharpen.
pub struct EnhancementPipeline {
    stages: Vec<Box<dyn EnhancementStage>>,
}

impl EnhancementPipeline {
    pub fn new(params: &EnhancementParams) -> Self {
        Self {
            stages: vec![
                Box::new(ColorRestorer::new(params.color_boost)),
                Box::new(ContrastEnhancer::new(
                    params.clahe_clip_limit,
                    params.clahe_grid,
                )),
                Box::new(Dehazer::new(params.haze_strength, params.min_transmission)),
                Box::new(Sharpener::default()),
            ],
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage over an 8-bit image and return a new 8-bit image.
    pub fn enhance(&self, image: &Image) -> Result<Image> {
        frame::ensure_non_empty(image)?;
        let unit = self.enhance_unit(frame::to_unit(image));
        Ok(frame::from_unit(&unit))
    }

    pub fn enhance_unit(&self, mut unit: UnitImage) -> UnitImage {
        for stage in &self.stages {
            let started = Instant::now();
            unit = stage.apply(&unit);
            log::debug!(
                "stage {} done in {}ms ({}x{})",
                stage.name(),
                started.elapsed().as_millis(),
                unit.width(),
                unit.height()
            );
        }
        unit
    }

    /// Enhance `original`, which was loaded from `source`. Nothing is written.
    pub fn enhance_source(&self, source: &Path, original: &Image) -> Result<EnhancementResult> {
        let enhanced = self
            .enhance(original)
            .with_context(|| format!("enhancing {}", source.display()))?;
        Ok(EnhancementResult {
            width: enhanced.width(),
            height: enhanced.height(),
            enhanced,
            source_path: source.to_path_buf(),
            produced_at: crate::now_s()?,
            output_path: None,
        })
    }
}

impl Default for EnhancementPipeline {
    fn default() -> Self {
        Self::new(&EnhancementParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PipelineError};
    use image::Rgb;

    fn murky(width: u32, height: u32) -> Image {
        Image::from_fn(width, height, |x, y| {
            let t = ((x * 7 + y * 3) % 40) as u8;
            Rgb([20 + t / 4, 90 + t, 110 + t / 2])
        })
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let pipeline = EnhancementPipeline::default();
        assert_eq!(
            pipeline.stage_names(),
            vec!["color_restore", "clahe", "dehaze", "sharpen"]
        );
    }

    #[test]
    fn output_matches_input_dimensions() {
        let input = murky(40, 30);
        let out = EnhancementPipeline::default().enhance(&input).unwrap();
        assert_eq!(out.dimensions(), (40, 30));
    }

    #[test]
    fn enhancement_is_deterministic() {
        let input = murky(33, 17);
        let pipeline = EnhancementPipeline::default();
        assert_eq!(
            pipeline.enhance(&input).unwrap(),
            pipeline.enhance(&input).unwrap()
        );
    }

    #[test]
    fn result_records_source_and_size() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = Path::new("dives/reef_02.png");
        let mut result = EnhancementPipeline::default().enhance_source(source, &murky(24, 18))?;
        assert_eq!(result.source_path, source);
        assert_eq!((result.width, result.height), (24, 18));
        assert!(result.output_path.is_none());

        let written = result.persist(dir.path())?;
        assert_eq!(result.output_path.as_deref(), Some(written.as_path()));
        assert_eq!(ingest::load_image(&written)?, result.enhanced);
        Ok(())
    }

    #[test]
    fn zero_size_input_is_rejected() {
        let err = EnhancementPipeline::default()
            .enhance(&Image::new(0, 0))
            .unwrap_err();
        assert_eq!(PipelineError::kind_of(&err), Some(ErrorKind::ImageLoad));
    }
}
