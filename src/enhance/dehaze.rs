use image::Rgb;

use super::EnhancementStage;
use crate::frame::{clip_unit, UnitImage};

/// Smallest atmospheric light used as a divisor.
const MIN_ATMOSPHERIC_LIGHT: f32 = 1e-6;

/// Haze removal with a global atmospheric-light model.
///
/// `A` is the per-channel maximum of the image, the transmission is
/// `max(1 - strength * min_c(I / A), floor)` and the scene is recovered as
/// `(I - A) / t + A`.
#[derive(Clone, Debug)]
pub struct Dehazer {
    strength: f32,
    min_transmission: f32,
}

impl Dehazer {
    pub fn new(strength: f32, min_transmission: f32) -> Self {
        Self {
            strength,
            min_transmission,
        }
    }

    pub fn atmospheric_light(&self, input: &UnitImage) -> [f32; 3] {
        let mut light = [0.0f32; 3];
        for Rgb(px) in input.pixels() {
            for c in 0..3 {
                light[c] = light[c].max(px[c]);
            }
        }
        light
    }

    /// Transmission per pixel in row-major order. Every value is at least the floor.
    pub fn transmission_map(&self, input: &UnitImage, light: [f32; 3]) -> Vec<f32> {
        let light = light.map(|a| a.max(MIN_ATMOSPHERIC_LIGHT));
        input
            .pixels()
            .map(|Rgb(px)| {
                let dark = (0..3)
                    .map(|c| px[c] / light[c])
                    .fold(f32::INFINITY, f32::min);
                (1.0 - self.strength * dark).max(self.min_transmission)
            })
            .collect()
    }
}

impl Default for Dehazer {
    fn default() -> Self {
        Self::new(0.3, 0.1)
    }
}

impl EnhancementStage for Dehazer {
    fn name(&self) -> &'static str {
        "dehaze"
    }

    fn apply(&self, input: &UnitImage) -> UnitImage {
        let light = self.atmospheric_light(input);
        let transmission = self.transmission_map(input, light);

        let mut out = input.clone();
        for (Rgb(px), t) in out.pixels_mut().zip(transmission) {
            for c in 0..3 {
                px[c] = clip_unit((px[c] - light[c]) / t + light[c]);
            }
        }
        out
    }
}
