use image::{ImageBuffer, Pixel};
use imageproc::filter::filter3x3;

use super::EnhancementStage;
use crate::frame::{clip_unit, UnitImage};

/// High-pass kernel, row-major; coefficients sum to 1 so flat regions keep their brightness.
pub const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Per-channel 3×3 convolution with reflect-101 borders.
#[derive(Clone, Debug)]
pub struct Sharpener {
    kernel: [f32; 9],
}

impl Sharpener {
    pub fn new(kernel: [f32; 9]) -> Self {
        Self { kernel }
    }
}

impl Default for Sharpener {
    fn default() -> Self {
        Self::new(SHARPEN_KERNEL)
    }
}

impl EnhancementStage for Sharpener {
    fn name(&self) -> &'static str {
        "sharpen"
    }

    fn apply(&self, input: &UnitImage) -> UnitImage {
        let filtered: UnitImage = filter3x3::<_, f32, f32>(&pad_reflect101(input), &self.kernel);
        let (width, height) = input.dimensions();
        UnitImage::from_fn(width, height, |x, y| {
            filtered.get_pixel(x + 1, y + 1).map(clip_unit)
        })
    }
}

/// One-pixel reflect-101 border around `image`.
///
/// `filter3x3` pads by repeating the edge sample; filtering the padded copy and
/// reading back the interior gives reflect-101 borders instead.
pub(crate) fn pad_reflect101<P: Pixel>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(width + 2, height + 2, |x, y| {
        *image.get_pixel(
            reflect101(x as i64 - 1, width),
            reflect101(y as i64 - 1, height),
        )
    })
}

/// Mirror an out-of-range index without repeating the edge sample (`dcb|abcd|cba`).
pub(crate) fn reflect101(pos: i64, len: u32) -> u32 {
    let len = len as i64;
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut p = pos.rem_euclid(period);
    if p >= len {
        p = period - p;
    }
    p as u32
}
