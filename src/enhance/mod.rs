//! Underwater enhancement stages.
//!
//! Stages run in a fixed order over a `UnitImage`:
//! colour restoration, CLAHE contrast, dehazing, sharpening.
//! Each stage clips its output to `[0,1]` before the next stage sees it.

mod color;
mod contrast;
mod dehaze;
mod pipeline;
mod sharpen;

pub use color::ColorRestorer;
pub use contrast::ContrastEnhancer;
pub use dehaze::Dehazer;
pub use pipeline::{EnhancementPipeline, EnhancementResult};
pub use sharpen::Sharpener;

pub(crate) use sharpen::pad_reflect101;

use serde::{Deserialize, Serialize};

use crate::frame::UnitImage;

/// A single enhancement stage.
///
/// Stages are stateless: `apply` reads its input and returns a new buffer.
pub trait EnhancementStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, input: &UnitImage) -> UnitImage;
}

/// Tunable constants of the enhancement chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementParams {
    /// Multiplier for the red channel.
    pub color_boost: f32,
    /// CLAHE clip limit, relative to a uniform histogram.
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid size (tiles per axis).
    pub clahe_grid: u32,
    /// Weight of the dark channel in the transmission estimate.
    pub haze_strength: f32,
    /// Lower bound of the transmission map.
    pub min_transmission: f32,
}

impl Default for EnhancementParams {
    fn default() -> Self {
        Self {
            color_boost: 1.5,
            clahe_clip_limit: 3.0,
            clahe_grid: 8,
            haze_strength: 0.3,
            min_transmission: 0.1,
        }
    }
}

impl EnhancementParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        use crate::error::PipelineError;

        if !(self.color_boost.is_finite() && self.color_boost >= 1.0) {
            return Err(PipelineError::invalid("color_boost must be >= 1.0").into());
        }
        if !(self.clahe_clip_limit.is_finite() && self.clahe_clip_limit > 0.0) {
            return Err(PipelineError::invalid("clahe_clip_limit must be > 0").into());
        }
        if self.clahe_grid == 0 {
            return Err(PipelineError::invalid("clahe_grid must be >= 1").into());
        }
        if !(0.0..1.0).contains(&self.haze_strength) {
            return Err(PipelineError::invalid("haze_strength must be in [0,1)").into());
        }
        if !(self.min_transmission > 0.0 && self.min_transmission <= 1.0) {
            return Err(PipelineError::invalid("min_transmission must be in (0,1]").into());
        }
        Ok(())
    }
}
