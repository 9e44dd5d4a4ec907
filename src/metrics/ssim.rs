use crate::frame::Image;

const WINDOW: u32 = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Mean structural similarity, averaged over the RGB channels.
///
/// Uses a 7×7 uniform window with sample covariance and crops half a window
/// from each border before averaging. Images smaller than the window are
/// scored with a single window covering the whole image.
pub fn ssim(a: &Image, b: &Image) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    (0..3).map(|c| channel_ssim(a, b, c)).sum::<f64>() / 3.0
}

fn channel_ssim(a: &Image, b: &Image, channel: usize) -> f64 {
    let (width, height) = a.dimensions();
    let xs: Vec<f64> = a.pixels().map(|p| p.0[channel] as f64).collect();
    let ys: Vec<f64> = b.pixels().map(|p| p.0[channel] as f64).collect();

    if width < WINDOW || height < WINDOW {
        return global_ssim(&xs, &ys);
    }

    let sums = WindowSums::new(&xs, &ys, width as usize, height as usize);
    let half = (WINDOW / 2) as usize;
    let n = (WINDOW * WINDOW) as f64;

    let mut total = 0.0;
    let mut count = 0usize;
    for y in half..height as usize - half {
        for x in half..width as usize - half {
            let [sx, sy, sxx, syy, sxy] = sums.window(x - half, y - half, WINDOW as usize);
            total += ssim_from_moments(sx, sy, sxx, syy, sxy, n);
            count += 1;
        }
    }
    total / count as f64
}

fn global_ssim(xs: &[f64], ys: &[f64]) -> f64 {
    let mut moments = [0.0f64; 5];
    for (&x, &y) in xs.iter().zip(ys) {
        moments[0] += x;
        moments[1] += y;
        moments[2] += x * x;
        moments[3] += y * y;
        moments[4] += x * y;
    }
    let [sx, sy, sxx, syy, sxy] = moments;
    ssim_from_moments(sx, sy, sxx, syy, sxy, xs.len() as f64)
}

fn ssim_from_moments(sx: f64, sy: f64, sxx: f64, syy: f64, sxy: f64, n: f64) -> f64 {
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);
    let cov_norm = if n > 1.0 { n / (n - 1.0) } else { 1.0 };

    let ux = sx / n;
    let uy = sy / n;
    let vx = cov_norm * (sxx / n - ux * ux);
    let vy = cov_norm * (syy / n - uy * uy);
    let vxy = cov_norm * (sxy / n - ux * uy);

    ((2.0 * ux * uy + c1) * (2.0 * vxy + c2)) / ((ux * ux + uy * uy + c1) * (vx + vy + c2))
}

/// Summed-area tables for x, y, x², y² and xy.
struct WindowSums {
    stride: usize,
    tables: [Vec<f64>; 5],
}

impl WindowSums {
    fn new(xs: &[f64], ys: &[f64], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut tables: [Vec<f64>; 5] = std::array::from_fn(|_| vec![0.0; stride * (height + 1)]);
        for y in 0..height {
            let mut row = [0.0f64; 5];
            for x in 0..width {
                let i = y * width + x;
                let (vx, vy) = (xs[i], ys[i]);
                let values = [vx, vy, vx * vx, vy * vy, vx * vy];
                for k in 0..5 {
                    row[k] += values[k];
                    let above = tables[k][y * stride + x + 1];
                    tables[k][(y + 1) * stride + x + 1] = above + row[k];
                }
            }
        }
        Self { stride, tables }
    }

    fn window(&self, x0: usize, y0: usize, size: usize) -> [f64; 5] {
        let (x1, y1) = (x0 + size, y0 + size);
        std::array::from_fn(|k| {
            let t = &self.tables[k];
            t[y1 * self.stride + x1] - t[y0 * self.stride + x1] - t[y1 * self.stride + x0]
                + t[y0 * self.stride + x0]
        })
    }
}
