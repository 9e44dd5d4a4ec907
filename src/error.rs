//! Typed pipeline errors.
//!
//! Every fallible operation returns `anyhow::Result`. When the failure belongs
//! to one of the kinds below, the underlying error is a `PipelineError` and
//! callers can recover the kind with [`PipelineError::kind_of`].

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreadable, corrupt or zero-size input image.
    ImageLoad,
    /// Resizing before metric computation failed.
    ShapeMismatch,
    /// No detector output was supplied for an image.
    DetectorUnavailable,
    /// Quality metrics could not be computed.
    MetricsComputation,
    /// Caller-supplied parameters out of range.
    InvalidParameters,
    /// One item of a batch failed.
    BatchItem,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ImageLoad => "IMAGE_LOAD",
            ErrorKind::ShapeMismatch => "SHAPE_MISMATCH",
            ErrorKind::DetectorUnavailable => "DETECTOR_UNAVAILABLE",
            ErrorKind::MetricsComputation => "METRICS_COMPUTATION",
            ErrorKind::InvalidParameters => "INVALID_PARAMETERS",
            ErrorKind::BatchItem => "BATCH_ITEM",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn image_load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImageLoad, message)
    }

    pub fn metrics(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MetricsComputation, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameters, message)
    }

    /// Finds the first `PipelineError` in an error chain and returns its kind.
    pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<PipelineError>())
            .map(|e| e.kind)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn kind_survives_context_wrapping() {
        let result: anyhow::Result<()> = Err(PipelineError::image_load("empty buffer").into());
        let err = result.context("enhancing frame_01.png").unwrap_err();
        assert_eq!(PipelineError::kind_of(&err), Some(ErrorKind::ImageLoad));
        assert!(format!("{err:#}").contains("IMAGE_LOAD: empty buffer"));
    }

    #[test]
    fn foreign_errors_have_no_kind() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(PipelineError::kind_of(&err), None);
    }
}
