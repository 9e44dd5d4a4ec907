use anyhow::Result;

use super::annotate::annotate;
use super::nms;
use super::params::DetectionParams;
use super::result::{Detection, ProcessedDetections, RawDetection, ThreatSummary};
use crate::frame::Image;

/// Turns raw detector boxes into classified detections, an annotated image
/// and a per-image summary.
#[derive(Clone, Debug, Default)]
pub struct DetectionResultProcessor {
    params: DetectionParams,
}

impl DetectionResultProcessor {
    pub fn new(params: DetectionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Classify, filter and draw `raw` onto a copy of `image`.
    ///
    /// Entries with an invalid box or confidence are skipped and counted in
    /// `rejected`. Survivors keep their input order.
    pub fn process(&self, image: &Image, raw: &[RawDetection]) -> ProcessedDetections {
        let mut rejected = 0;
        let classified: Vec<Detection> = raw
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match Detection::from_raw(r) {
                Ok(d) => Some(d),
                Err(err) => {
                    log::warn!("skipping raw detection #{i}: {err}");
                    rejected += 1;
                    None
                }
            })
            .filter(|d| d.confidence() >= self.params.confidence_threshold)
            .collect();

        let mut keep = nms::suppress(&classified, self.params.nms_threshold);
        keep.truncate(self.params.max_detections);
        keep.sort_unstable();

        let mut slots: Vec<Option<Detection>> = classified.into_iter().map(Some).collect();
        let detections: Vec<Detection> = keep
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        log::debug!(
            "kept {} of {} raw detections ({} rejected)",
            detections.len(),
            raw.len(),
            rejected
        );

        ProcessedDetections {
            annotated: annotate(image, &detections),
            summary: ThreatSummary::from_detections(&detections),
            detections,
            rejected,
        }
    }
}
