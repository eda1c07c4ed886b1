use thiserror::Error;
use viralscore_core::SubmissionStatus;

use crate::collaborators::CollaboratorError;
use crate::store::StoreError;
use crate::validate::ValidationIssue;

/// Coarse grouping of [`EngineError`] variants by who has to act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller's input was wrong; surface the message as-is.
    InputRejection,
    /// An external collaborator failed; recoverable by retry or manual review.
    Upstream,
    /// An invariant inside the engine broke. Never expected in normal operation.
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("video duration must be a positive number of seconds (got {0})")]
    InvalidDuration(f64),

    #[error("{message}")]
    DurationExceeded { seconds: f64, message: String },

    #[error("submission failed validation: {}", join_issues(.0))]
    ValidationFailed(Vec<ValidationIssue>),

    #[error("duration probe failed: {0}")]
    ProbeFailed(#[source] CollaboratorError),

    #[error("frame extraction failed: {0}")]
    FrameExtractionFailed(String),

    #[error("frame {frame_index} could not be scored: {reason}")]
    FrameScoringFailed { frame_index: usize, reason: String },

    #[error("frame {frame_index} was scored with low confidence: {reason}")]
    LowConfidenceScore { frame_index: usize, reason: String },

    #[error("no scoring frames left after outlier removal")]
    InsufficientFrames,

    #[error("submission {0} not found")]
    SubmissionNotFound(i64),

    #[error("submission cannot move from {from} to {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("a pipeline run is already in flight for submission {0}")]
    RunInFlight(i64),

    #[error("pipeline run for submission {0} was cancelled")]
    Cancelled(i64),

    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(i64),

    #[error("credit ledger error: {0}")]
    Ledger(#[source] CollaboratorError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidDuration(_)
            | EngineError::DurationExceeded { .. }
            | EngineError::ValidationFailed(_)
            | EngineError::SubmissionNotFound(_)
            | EngineError::InvalidTransition { .. }
            | EngineError::RunInFlight(_)
            | EngineError::Cancelled(_)
            | EngineError::ScoreOutOfRange(_) => ErrorClass::InputRejection,
            EngineError::ProbeFailed(_)
            | EngineError::FrameExtractionFailed(_)
            | EngineError::FrameScoringFailed { .. }
            | EngineError::LowConfidenceScore { .. }
            | EngineError::Ledger(_) => ErrorClass::Upstream,
            EngineError::InsufficientFrames | EngineError::Store(_) => ErrorClass::Internal,
        }
    }

    /// Stable machine-readable code, used in API error envelopes and run records.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidDuration(_) => "invalid_duration",
            EngineError::DurationExceeded { .. } => "duration_exceeded",
            EngineError::ValidationFailed(_) => "validation_failed",
            EngineError::ProbeFailed(_) => "probe_failed",
            EngineError::FrameExtractionFailed(_) => "frame_extraction_failed",
            EngineError::FrameScoringFailed { .. } => "frame_scoring_failed",
            EngineError::LowConfidenceScore { .. } => "low_confidence_score",
            EngineError::InsufficientFrames => "insufficient_frames",
            EngineError::SubmissionNotFound(_) => "not_found",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::RunInFlight(_) => "run_in_flight",
            EngineError::Cancelled(_) => "cancelled",
            EngineError::ScoreOutOfRange(_) => "score_out_of_range",
            EngineError::Ledger(_) => "ledger_error",
            EngineError::Store(_) => "store_error",
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_errors_are_input_rejections() {
        assert_eq!(
            EngineError::InvalidDuration(0.0).class(),
            ErrorClass::InputRejection
        );
        let exceeded = EngineError::DurationExceeded {
            seconds: 700.0,
            message: "too long".to_string(),
        };
        assert_eq!(exceeded.class(), ErrorClass::InputRejection);
        assert_eq!(exceeded.to_string(), "too long");
    }

    #[test]
    fn frame_failures_are_upstream() {
        let err = EngineError::LowConfidenceScore {
            frame_index: 2,
            reason: "blurry".to_string(),
        };
        assert_eq!(err.class(), ErrorClass::Upstream);
        assert_eq!(err.code(), "low_confidence_score");
    }

    #[test]
    fn insufficient_frames_is_internal() {
        assert_eq!(EngineError::InsufficientFrames.class(), ErrorClass::Internal);
    }

    #[test]
    fn validation_failed_lists_every_issue() {
        let err = EngineError::ValidationFailed(vec![
            ValidationIssue::LicenseNotAgreed,
            ValidationIssue::NoScreenshots,
        ]);
        let msg = err.to_string();
        assert!(msg.contains("license"), "{msg}");
        assert!(msg.contains("screenshot"), "{msg}");
    }
}
