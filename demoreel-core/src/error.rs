//! Stage error taxonomy
//!
//! Fatality is decided where the failure happens; the orchestrator is the
//! only component that turns these into persisted terminal or paused status
//! and user-visible error text.

use thiserror::Error;

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum StageError {
    /// Planning failed: model call errored, returned nothing, or returned
    /// content without a parsable JSON array. Terminal for the demo.
    #[error("planning failed: {0}")]
    Planning(String),

    /// The synthesis backend is unavailable. Recovered locally via the
    /// silence fallback, never surfaced to the demo.
    #[error("speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// Muxing failed: no audio clips or the encode errored. Terminal.
    #[error("mux failed: {0}")]
    Mux(String),

    /// Browser-level failure outside any single step.
    #[error("browser error: {0}")]
    Browser(String),

    /// Filesystem or child-process failure while handling media files.
    #[error("media io error: {0}")]
    MediaIo(String),
}

impl From<std::io::Error> for StageError {
    fn from(e: std::io::Error) -> Self {
        StageError::MediaIo(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_stage_prefix() {
        let err = StageError::Planning("model returned empty content".to_string());
        assert_eq!(
            err.to_string(),
            "planning failed: model returned empty content"
        );

        let err: StageError = std::io::Error::other("disk full").into();
        assert_eq!(err.to_string(), "media io error: disk full");
    }
}
