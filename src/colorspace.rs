//! sRGB <-> CIE Lab and grayscale in the 8-bit encodings used for CLAHE and UIQM.
//!
//! The 8-bit Lab encoding stores `L·255/100` in the first channel and
//! offsets `a`/`b` by 128, matching what common imaging libraries emit for
//! 8-bit images. UIQM colorfulness is defined on that encoding.

use palette::white_point::D65;
use palette::{IntoColor, Lab, LinSrgb, Srgb};

const L_SCALE: f32 = 255.0 / 100.0;
const AB_OFFSET: f32 = 128.0;

/// Convert a unit RGB sample to 8-bit-encoded Lab (not rounded).
pub fn rgb_to_lab8(rgb: [f32; 3]) -> [f32; 3] {
    let lab: Lab<D65, f32> = Srgb::new(rgb[0], rgb[1], rgb[2]).into_linear().into_color();
    [
        (lab.l * L_SCALE).clamp(0.0, 255.0),
        (lab.a + AB_OFFSET).clamp(0.0, 255.0),
        (lab.b + AB_OFFSET).clamp(0.0, 255.0),
    ]
}

/// Convert 8-bit-encoded Lab back to a unit RGB sample, clipped to `[0,1]`.
pub fn lab8_to_rgb(lab8: [f32; 3]) -> [f32; 3] {
    let lab = Lab::<D65, f32>::new(
        lab8[0] / L_SCALE,
        lab8[1] - AB_OFFSET,
        lab8[2] - AB_OFFSET,
    );
    let linear: LinSrgb<f32> = lab.into_color();
    let srgb = Srgb::<f32>::from_linear(linear);
    [
        crate::frame::clip_unit(srgb.red),
        crate::frame::clip_unit(srgb.green),
        crate::frame::clip_unit(srgb.blue),
    ]
}

/// BT.601 luma of an 8-bit RGB pixel, rounded to 8 bits.
pub fn gray8(rgb: [u8; 3]) -> u8 {
    let y = 0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32;
    crate::frame::clamp_to_u8(y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_gray_has_centered_chroma() {
        let lab = rgb_to_lab8([0.5, 0.5, 0.5]);
        assert!((lab[1] - 128.0).abs() < 0.5);
        assert!((lab[2] - 128.0).abs() < 0.5);
    }

    #[test]
    fn white_maps_to_full_lightness() {
        let lab = rgb_to_lab8([1.0, 1.0, 1.0]);
        assert!((lab[0] - 255.0).abs() < 0.5);
    }

    #[test]
    fn lab_round_trip_is_close() {
        for rgb in [[0.2, 0.4, 0.6], [0.9, 0.1, 0.3], [0.0, 0.0, 0.0]] {
            let back = lab8_to_rgb(rgb_to_lab8(rgb));
            for c in 0..3 {
                assert!((back[c] - rgb[c]).abs() < 1e-3, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn gray_weights_sum_to_one() {
        assert_eq!(gray8([255, 255, 255]), 255);
        assert_eq!(gray8([0, 0, 0]), 0);
        assert_eq!(gray8([255, 0, 0]), 76);
    }
}
