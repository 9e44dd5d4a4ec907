//! Pixel buffers shared by every stage.
//!
//! - `Image`: 8-bit RGB buffer handed in by callers and returned by the pipeline.
//! - `UnitImage`: float RGB buffer with samples in `[0,1]`, exchanged between
//!   enhancement stages.
//!
//! Stages never mutate their input. Each one allocates a new buffer, so a
//! caller can keep the original next to the enhanced copy.

use anyhow::Result;
use image::{Rgb, Rgb32FImage, RgbImage};

use crate::error::PipelineError;

/// Dense H×W×3 8-bit buffer in RGB channel order.
pub type Image = RgbImage;

/// Dense H×W×3 float buffer, samples in `[0,1]`.
pub type UnitImage = Rgb32FImage;

/// Index of the red channel in `Image` and `UnitImage`.
pub const RED: usize = 0;

// ----------------------------------------------------------------------------
// Construction and validation
// ----------------------------------------------------------------------------

/// Zero-area images are treated as unreadable input.
pub fn ensure_non_empty(image: &Image) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::image_load(format!(
            "image has zero size ({}x{})",
            image.width(),
            image.height()
        ))
        .into());
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// 8-bit <-> unit conversions
// ----------------------------------------------------------------------------

pub fn to_unit(image: &Image) -> UnitImage {
    UnitImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgb([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
    })
}

pub fn from_unit(unit: &UnitImage) -> Image {
    Image::from_fn(unit.width(), unit.height(), |x, y| {
        let Rgb([r, g, b]) = *unit.get_pixel(x, y);
        Rgb([
            clamp_to_u8(r * 255.0),
            clamp_to_u8(g * 255.0),
            clamp_to_u8(b * 255.0),
        ])
    })
}

pub fn clamp_to_u8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

/// Clip a float sample to `[0,1]`. NaN collapses to 0.
pub fn clip_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Mean of one channel over the whole buffer.
pub fn channel_mean(unit: &UnitImage, channel: usize) -> f64 {
    let count = unit.width() as f64 * unit.height() as f64;
    if count == 0.0 {
        return 0.0;
    }
    let sum: f64 = unit.pixels().map(|p| p.0[channel] as f64).sum();
    sum / count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_is_an_image_load_error() {
        assert!(ensure_non_empty(&Image::new(3, 4)).is_ok());
        let err = ensure_non_empty(&Image::new(0, 4)).unwrap_err();
        assert_eq!(
            PipelineError::kind_of(&err),
            Some(crate::error::ErrorKind::ImageLoad)
        );
    }

    #[test]
    fn unit_round_trip_is_lossless_for_8bit_samples() {
        let image = Image::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 200]));
        assert_eq!(from_unit(&to_unit(&image)), image);
    }

    #[test]
    fn clip_handles_nan_and_overflow() {
        assert_eq!(clip_unit(f32::NAN), 0.0);
        assert_eq!(clip_unit(1.7), 1.0);
        assert_eq!(clip_unit(-0.2), 0.0);
        assert_eq!(clamp_to_u8(300.0), 255);
    }
}
