//! HTTP client for the frame grader.
//!
//! The grader returns six sub-scores per image. It is a model behind an API,
//! so values outside `0..=100` are clamped rather than trusted, and a
//! `low_confidence` flag turns the answer into a manual-review signal.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use viralscore_core::{SubScores, MAX_SCORE};
use viralscore_engine::{FrameScorer, FrameVerdict};

use crate::error::ClientError;
use crate::http::{build_client, endpoint, parse_base_url, send_json};

const SERVICE: &str = "grader";

#[derive(Debug, Serialize)]
struct GradeRequest<'a> {
    image_ref: &'a str,
}

/// Raw grader answer. Scores are signed and unbounded on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeResponse {
    pub composition: i64,
    pub color_grading: i64,
    pub lighting: i64,
    pub emotional_impact: i64,
    pub technical_quality: i64,
    pub narrative_value: i64,
    #[serde(default)]
    pub low_confidence: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl GradeResponse {
    #[must_use]
    pub fn sub_scores(&self) -> SubScores {
        SubScores {
            composition: clamp(self.composition),
            color_grading: clamp(self.color_grading),
            lighting: clamp(self.lighting),
            emotional_impact: clamp(self.emotional_impact),
            technical_quality: clamp(self.technical_quality),
            narrative_value: clamp(self.narrative_value),
        }
    }

    #[must_use]
    pub fn into_verdict(self) -> FrameVerdict {
        if self.low_confidence {
            return FrameVerdict::NeedsReview {
                reason: self
                    .reason
                    .unwrap_or_else(|| "grader reported low confidence".to_string()),
            };
        }
        FrameVerdict::Scored(self.sub_scores())
    }
}

fn clamp(value: i64) -> u8 {
    u8::try_from(value.clamp(0, i64::from(MAX_SCORE))).unwrap_or(MAX_SCORE)
}

/// Client for the frame grader: `POST v1/grade` with `{"image_ref"}`.
pub struct GraderClient {
    client: Client,
    base_url: Url,
}

impl GraderClient {
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`ClientError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// # Errors
    ///
    /// - [`ClientError::Http`] on network failure.
    /// - [`ClientError::Status`] on a non-2xx answer.
    /// - [`ClientError::Deserialize`] if the body is not the expected shape.
    pub async fn grade(&self, image_ref: &str) -> Result<GradeResponse, ClientError> {
        let url = endpoint(&self.base_url, "v1/grade")?;
        let request = self.client.post(url).json(&GradeRequest { image_ref });
        send_json(SERVICE, "grade", request).await
    }
}

#[async_trait]
impl FrameScorer for GraderClient {
    async fn score(&self, image_ref: &str) -> FrameVerdict {
        match self.grade(image_ref).await {
            Ok(response) => response.into_verdict(),
            Err(err) => {
                let retriable = err.is_retriable();
                tracing::debug!(image_ref, retriable, error = %err, "grader call failed");
                FrameVerdict::Failed {
                    reason: err.to_string(),
                    retriable,
                }
            }
        }
    }
}
