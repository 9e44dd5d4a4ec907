use image::Rgb;

use super::EnhancementStage;
use crate::colorspace::{lab8_to_rgb, rgb_to_lab8};
use crate::frame::UnitImage;

const BINS: usize = 256;

/// Contrast-limited adaptive histogram equalization on the Lab lightness channel.
///
/// Chrominance is carried through unchanged, so only local contrast moves.
#[derive(Clone, Debug)]
pub struct ContrastEnhancer {
    clip_limit: f32,
    grid: u32,
}

impl ContrastEnhancer {
    pub fn new(clip_limit: f32, grid: u32) -> Self {
        Self {
            clip_limit,
            grid: grid.max(1),
        }
    }
}

impl Default for ContrastEnhancer {
    fn default() -> Self {
        Self::new(3.0, 8)
    }
}

impl EnhancementStage for ContrastEnhancer {
    fn name(&self) -> &'static str {
        "clahe"
    }

    fn apply(&self, input: &UnitImage) -> UnitImage {
        let (width, height) = input.dimensions();
        let lab: Vec<[f32; 3]> = input.pixels().map(|p| rgb_to_lab8(p.0)).collect();
        let lightness: Vec<u8> = lab.iter().map(|l| l[0].round() as u8).collect();

        let equalized = clahe(&lightness, width, height, self.clip_limit, self.grid);

        UnitImage::from_fn(width, height, |x, y| {
            let idx = (y * width + x) as usize;
            let [_, a, b] = lab[idx];
            Rgb(lab8_to_rgb([equalized[idx] as f32, a, b]))
        })
    }
}

/// Tile layout over one axis: tile count and tile length in pixels.
fn tiling(len: u32, grid: u32) -> (u32, u32) {
    let tiles = grid.min(len).max(1);
    let tile_len = len.div_ceil(tiles);
    (len.div_ceil(tile_len), tile_len)
}

/// CLAHE over an 8-bit plane.
///
/// Each tile gets a clipped, redistributed histogram and a cumulative LUT;
/// output pixels blend the four nearest tile LUTs bilinearly.
pub(crate) fn clahe(plane: &[u8], width: u32, height: u32, clip_limit: f32, grid: u32) -> Vec<u8> {
    if plane.is_empty() {
        return Vec::new();
    }
    let (tiles_x, tile_w) = tiling(width, grid);
    let (tiles_y, tile_h) = tiling(height, grid);

    let mut luts: Vec<[u8; BINS]> = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; BINS];
            for y in y0..y1 {
                let row = (y * width) as usize;
                for x in x0..x1 {
                    hist[plane[row + x as usize] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts.push(tile_lut(&mut hist, area, clip_limit));
        }
    }

    let mut out = vec![0u8; plane.len()];
    for y in 0..height {
        let (ty0, ty1, wy) = neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = neighbours(x, tile_w, tiles_x);
            let idx = (y * width + x) as usize;
            let v = plane[idx] as usize;

            let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
            let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
            let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
            out[idx] = crate::frame::clamp_to_u8(top * (1.0 - wy) + bottom * wy);
        }
    }
    out
}

fn tile_lut(hist: &mut [u32; BINS], area: u32, clip_limit: f32) -> [u8; BINS] {
    let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let per_bin = excess / BINS as u32;
    let residual = (excess - per_bin * BINS as u32) as usize;
    for count in hist.iter_mut() {
        *count += per_bin;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for i in (0..BINS).step_by(step).take(residual) {
            hist[i] += 1;
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; BINS];
    let mut sum = 0u32;
    for (i, count) in hist.iter().enumerate() {
        sum += count;
        lut[i] = crate::frame::clamp_to_u8(sum as f32 * scale);
    }
    lut
}

/// Nearest tile indices around a pixel coordinate and the blend weight of the second.
fn neighbours(pos: u32, tile_len: u32, tiles: u32) -> (u32, u32, f32) {
    let f = pos as f32 / tile_len as f32 - 0.5;
    let base = f.floor();
    let weight = f - base;
    let last = tiles as i64 - 1;
    let t0 = (base as i64).clamp(0, last) as u32;
    let t1 = (base as i64 + 1).clamp(0, last) as u32;
    (t0, t1, weight)
}
