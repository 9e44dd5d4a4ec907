use image::Rgb;

use super::EnhancementStage;
use crate::frame::{clip_unit, UnitImage, RED};

/// Compensates for wavelength-dependent absorption by boosting the red channel.
///
/// Red light is absorbed first underwater, so it is the channel that loses
/// the most energy. Pixels are processed independently.
#[derive(Clone, Debug)]
pub struct ColorRestorer {
    channel: usize,
    boost: f32,
}

impl ColorRestorer {
    pub fn new(boost: f32) -> Self {
        Self {
            channel: RED,
            boost,
        }
    }
}

impl Default for ColorRestorer {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl EnhancementStage for ColorRestorer {
    fn name(&self) -> &'static str {
        "color_restore"
    }

    fn apply(&self, input: &UnitImage) -> UnitImage {
        let mut out = input.clone();
        for Rgb(px) in out.pixels_mut() {
            px[self.channel] = clip_unit(px[self.channel] * self.boost);
        }
        out
    }
}
