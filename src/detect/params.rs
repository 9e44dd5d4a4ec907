use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Post-processing knobs applied to raw detector output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub confidence_threshold: f64,
    pub nms_threshold: f32,
    pub max_detections: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            max_detections: 100,
        }
    }
}

impl DetectionParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::invalid(format!(
                "confidence_threshold {} must be within [0, 1]",
                self.confidence_threshold
            ))
            .into());
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(PipelineError::invalid(format!(
                "nms_threshold {} must be within [0, 1]",
                self.nms_threshold
            ))
            .into());
        }
        if self.max_detections == 0 {
            return Err(PipelineError::invalid("max_detections must be at least 1").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_are_valid() {
        let params = DetectionParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_detections, 100);
    }

    #[test]
    fn out_of_range_thresholds_are_invalid_parameters() {
        let params = DetectionParams {
            nms_threshold: 1.2,
            ..DetectionParams::default()
        };
        let err = params.validate().unwrap_err();
        assert_eq!(
            PipelineError::kind_of(&err),
            Some(ErrorKind::InvalidParameters)
        );

        let params = DetectionParams {
            confidence_threshold: f64::NAN,
            ..DetectionParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let params: DetectionParams =
            serde_json::from_str(r#"{"confidence_threshold":0.25}"#).unwrap();
        assert_eq!(params.confidence_threshold, 0.25);
        assert_eq!(params.nms_threshold, 0.4);
    }
}
