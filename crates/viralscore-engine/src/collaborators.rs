//! Capability traits for the external services the engine depends on.
//!
//! The pipeline only talks to these traits. Production wiring plugs in the
//! HTTP clients from `viralscore-clients`; tests plug in deterministic stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use viralscore_core::SubScores;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Timeouts, connection failures, 5xx. Worth another attempt.
    #[error("{service} temporarily unavailable: {message}")]
    Transient {
        service: &'static str,
        message: String,
    },

    /// The collaborator understood the request and refused it.
    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    #[must_use]
    pub fn transient(service: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            service,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            message: message.into(),
        }
    }
}

/// A still frame sampled from a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFrame {
    pub frame_index: usize,
    pub timestamp: f64,
    pub image_ref: String,
}

/// Tagged result of grading one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameVerdict {
    Scored(SubScores),
    /// The grader answered but is not confident; a human should look.
    NeedsReview { reason: String },
    Failed { reason: String, retriable: bool },
}

#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Actual length of the video asset, in seconds.
    async fn probe(&self, video_url: &str) -> Result<f64, CollaboratorError>;
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// One frame per requested timestamp, in the same order.
    async fn extract(
        &self,
        video_url: &str,
        timestamps: &[f64],
    ) -> Result<Vec<ExtractedFrame>, CollaboratorError>;
}

#[async_trait]
pub trait FrameScorer: Send + Sync {
    async fn score(&self, image_ref: &str) -> FrameVerdict;
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Atomically add `delta` (possibly negative) to the user's balance and
    /// return the new balance.
    async fn apply_delta(&self, user_id: i64, delta: i64) -> Result<i64, CollaboratorError>;

    async fn balance(&self, user_id: i64) -> Result<i64, CollaboratorError>;
}
