use serde::{Deserialize, Serialize};

use super::QualityMetrics;

/// Categorical label for a metric value. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl QualityGrade {
    /// `> excellent` is excellent, `[good, excellent]` good, `[acceptable, good)` acceptable.
    fn from_bands(value: f64, excellent: f64, good: f64, acceptable: f64) -> Self {
        if value > excellent {
            QualityGrade::Excellent
        } else if value >= good {
            QualityGrade::Good
        } else if value >= acceptable {
            QualityGrade::Acceptable
        } else {
            QualityGrade::Poor
        }
    }

    pub fn psnr(db: f64) -> Self {
        Self::from_bands(db, 30.0, 25.0, 20.0)
    }

    pub fn ssim(value: f64) -> Self {
        Self::from_bands(value, 0.9, 0.8, 0.7)
    }

    pub fn uiqm(value: f64) -> Self {
        Self::from_bands(value, 4.0, 3.0, 2.0)
    }
}

/// Minimum acceptable values, used to flag results for callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_psnr: f64,
    pub min_ssim: f64,
    pub min_uiqm: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_psnr: 20.0,
            min_ssim: 0.7,
            min_uiqm: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QualityReport {
    #[serde(flatten)]
    pub metrics: QualityMetrics,
    pub psnr_grade: QualityGrade,
    pub ssim_grade: QualityGrade,
    pub uiqm_grade: QualityGrade,
    pub meets_minimums: bool,
}

impl QualityReport {
    pub fn new(metrics: QualityMetrics, thresholds: &QualityThresholds) -> Self {
        Self {
            psnr_grade: QualityGrade::psnr(metrics.psnr),
            ssim_grade: QualityGrade::ssim(metrics.ssim),
            uiqm_grade: QualityGrade::uiqm(metrics.uiqm),
            meets_minimums: metrics.psnr >= thresholds.min_psnr
                && metrics.ssim >= thresholds.min_ssim
                && metrics.uiqm >= thresholds.min_uiqm,
            metrics,
        }
    }
}
