use image::{GrayImage, Luma};
use imageproc::filter::filter3x3;

use crate::colorspace::{gray8, rgb_to_lab8};
use crate::enhance::pad_reflect101;
use crate::frame::Image;

const COLORFULNESS_WEIGHT: f64 = 0.4;
const SHARPNESS_WEIGHT: f64 = 0.3;
const CONTRAST_WEIGHT: f64 = 0.3;

/// Normalizers keep UIQM values comparable with other implementations.
const COLORFULNESS_SCALE: f64 = 100.0;
const SHARPNESS_SCALE: f64 = 10_000.0;
const CONTRAST_SCALE: f64 = 255.0;

/// 4-neighbour Laplacian, row-major.
const LAPLACIAN_KERNEL: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Underwater image quality: `0.4·colorfulness + 0.3·sharpness + 0.3·contrast`.
pub fn uiqm(image: &Image) -> f64 {
    let gray = grayscale(image);
    COLORFULNESS_WEIGHT * colorfulness(image)
        + SHARPNESS_WEIGHT * laplacian_variance(&gray) / SHARPNESS_SCALE
        + CONTRAST_WEIGHT * std_dev(gray.pixels().map(|p| p.0[0] as f64)) / CONTRAST_SCALE
}

/// Chroma spread plus 0.3 × chroma magnitude on the 8-bit Lab `a`/`b` channels, over 100.
pub fn colorfulness(image: &Image) -> f64 {
    let (a, b): (Vec<f64>, Vec<f64>) = image
        .pixels()
        .map(|p| {
            let unit = p.0.map(|c| c as f32 / 255.0);
            let lab = rgb_to_lab8(unit);
            (lab[1].round() as f64, lab[2].round() as f64)
        })
        .unzip();
    let (mean_a, std_a) = mean_std(a.iter().copied());
    let (mean_b, std_b) = mean_std(b.iter().copied());
    ((std_a.powi(2) + std_b.powi(2)).sqrt() + 0.3 * (mean_a.powi(2) + mean_b.powi(2)).sqrt())
        / COLORFULNESS_SCALE
}

/// Variance of the 4-neighbour Laplacian of the grayscale image, over 10000.
pub fn sharpness(image: &Image) -> f64 {
    let gray = grayscale(image);
    laplacian_variance(&gray) / SHARPNESS_SCALE
}

/// Standard deviation of grayscale intensity, over 255.
pub fn contrast(image: &Image) -> f64 {
    std_dev(grayscale(image).pixels().map(|p| p.0[0] as f64)) / CONTRAST_SCALE
}

fn grayscale(image: &Image) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([gray8(image.get_pixel(x, y).0)])
    })
}

/// Population variance of the Laplacian response, reflect-101 borders.
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let padded = pad_reflect101(gray);
    let response: image::ImageBuffer<Luma<f32>, Vec<f32>> =
        filter3x3::<_, f32, f32>(&padded, &LAPLACIAN_KERNEL);
    let (width, height) = gray.dimensions();
    let interior = (1..=height)
        .flat_map(|y| (1..=width).map(move |x| (x, y)))
        .map(|(x, y)| response.get_pixel(x, y).0[0] as f64);
    let (_, std) = mean_std(interior);
    std * std
}

fn std_dev(values: impl Iterator<Item = f64>) -> f64 {
    mean_std(values).1
}

/// Population mean and standard deviation in one pass (Welford).
fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut n = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for v in values {
        n += 1;
        let delta = v - mean;
        mean += delta / n as f64;
        m2 += delta * (v - mean);
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    (mean, (m2 / n as f64).sqrt())
}
