//! Scoring pipeline: probe, extract, grade every frame, drop outliers, average.
//!
//! Frame grading fans out with a concurrency cap and joins before the outlier
//! step. One frame that cannot be graded fails the whole run, because the
//! drop count is fixed by the number of extracted frames.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use viralscore_core::{AppConfig, FrameAnalysis, SamplingStrategy, SubScores, VideoSubmission};

use crate::aggregate::{viral_score, DimensionBreakdown};
use crate::collaborators::{
    DurationProbe, ExtractedFrame, FrameExtractor, FrameScorer, FrameVerdict,
};
use crate::duration::{plan_frame_timestamps, validate_duration};
use crate::error::EngineError;
use crate::frame_score::frame_score;
use crate::outlier::drop_outliers;
use crate::retry::{retry_with_backoff, RetryPolicy, Transient};

/// Probed and declared durations further apart than this are logged.
const DURATION_MISMATCH_TOLERANCE_SECS: f64 = 1.0;

/// The external services one pipeline run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn DurationProbe>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub scorer: Arc<dyn FrameScorer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum number of frame-grading calls in flight per run.
    pub frame_concurrency: usize,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            frame_concurrency: config.frame_concurrency.max(1),
            retry: RetryPolicy::from_app_config(config),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of a completed scoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredVideo {
    pub viral_score: u8,
    /// Every extracted frame in extraction order, with `dropped` set.
    pub frames: Vec<FrameAnalysis>,
    pub breakdown: DimensionBreakdown,
    pub strategy: SamplingStrategy,
    pub probed_duration: f64,
}

pub struct ScoringPipeline {
    collaborators: Collaborators,
    config: PipelineConfig,
}

/// Why a single frame could not be graded.
#[derive(Debug)]
enum FrameFailure {
    LowConfidence(String),
    Failed { reason: String, retriable: bool },
}

impl Transient for FrameFailure {
    fn is_transient(&self) -> bool {
        matches!(self, FrameFailure::Failed { retriable: true, .. })
    }
}

impl std::fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameFailure::LowConfidence(reason) => write!(f, "low confidence: {reason}"),
            FrameFailure::Failed { reason, .. } => f.write_str(reason),
        }
    }
}

impl ScoringPipeline {
    #[must_use]
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Score one submission's video.
    ///
    /// The declared duration is checked before any collaborator is called.
    /// The probed duration then picks the sampling strategy. Cancelling
    /// `cancel` abandons in-flight collaborator calls.
    ///
    /// # Errors
    ///
    /// - Duration errors for an invalid declared or probed duration.
    /// - Upstream errors ([`EngineError::ProbeFailed`],
    ///   [`EngineError::FrameExtractionFailed`], [`EngineError::FrameScoringFailed`],
    ///   [`EngineError::LowConfidenceScore`]) once retries are exhausted.
    /// - [`EngineError::Cancelled`] if the token fires first.
    pub async fn run(
        &self,
        submission: &VideoSubmission,
        cancel: &CancellationToken,
    ) -> Result<ScoredVideo, EngineError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(EngineError::Cancelled(submission.id)),
            result = self.score(submission) => result,
        }
    }

    async fn score(&self, submission: &VideoSubmission) -> Result<ScoredVideo, EngineError> {
        validate_duration(submission.duration_seconds)?;

        let probe = &self.collaborators.probe;
        let video_url = submission.video_url.as_str();
        let probed_duration = retry_with_backoff(self.config.retry, "duration probe", || {
            probe.probe(video_url)
        })
        .await
        .map_err(EngineError::ProbeFailed)?;

        if (probed_duration - submission.duration_seconds).abs() > DURATION_MISMATCH_TOLERANCE_SECS
        {
            tracing::warn!(
                submission_id = submission.id,
                declared = submission.duration_seconds,
                probed = probed_duration,
                "declared duration does not match the video asset; using the probed value"
            );
        }
        let strategy = validate_duration(probed_duration)?;

        let timestamps = plan_frame_timestamps(probed_duration, strategy.total_extracted);
        let extractor = &self.collaborators.extractor;
        let extracted = retry_with_backoff(self.config.retry, "frame extractor", || {
            extractor.extract(video_url, &timestamps)
        })
        .await
        .map_err(|e| EngineError::FrameExtractionFailed(e.to_string()))?;
        let extracted = check_extracted(extracted, strategy.total_extracted)?;

        tracing::debug!(
            submission_id = submission.id,
            frames = extracted.len(),
            concurrency = self.config.frame_concurrency,
            "grading frames"
        );

        let mut graded: Vec<FrameAnalysis> = stream::iter(extracted)
            .map(|frame| self.grade_frame(submission.id, frame))
            .buffer_unordered(self.config.frame_concurrency.max(1))
            .try_collect()
            .await?;
        graded.sort_by_key(|f| f.frame_index);

        let frames = drop_outliers(&graded, strategy.dropped_count);
        let score = viral_score(&frames)?;
        let breakdown = DimensionBreakdown::from_frames(&frames);

        Ok(ScoredVideo {
            viral_score: score,
            frames,
            breakdown,
            strategy,
            probed_duration,
        })
    }

    async fn grade_frame(
        &self,
        submission_id: i64,
        frame: ExtractedFrame,
    ) -> Result<FrameAnalysis, EngineError> {
        let scorer = &self.collaborators.scorer;
        let image_ref = frame.image_ref.as_str();
        let graded = retry_with_backoff(self.config.retry, "frame scorer", || async move {
            match scorer.score(image_ref).await {
                FrameVerdict::Scored(sub_scores) => Ok(clamp_sub_scores(sub_scores)),
                FrameVerdict::NeedsReview { reason } => Err(FrameFailure::LowConfidence(reason)),
                FrameVerdict::Failed { reason, retriable } => {
                    Err(FrameFailure::Failed { reason, retriable })
                }
            }
        })
        .await;

        match graded {
            Ok(sub_scores) => Ok(FrameAnalysis {
                frame_index: frame.frame_index,
                timestamp: frame.timestamp,
                frame_score: frame_score(&sub_scores),
                sub_scores,
                image_ref: frame.image_ref,
                dropped: false,
            }),
            Err(FrameFailure::LowConfidence(reason)) => {
                tracing::warn!(
                    submission_id,
                    frame_index = frame.frame_index,
                    %reason,
                    "frame grader reported low confidence"
                );
                Err(EngineError::LowConfidenceScore {
                    frame_index: frame.frame_index,
                    reason,
                })
            }
            Err(FrameFailure::Failed { reason, .. }) => Err(EngineError::FrameScoringFailed {
                frame_index: frame.frame_index,
                reason,
            }),
        }
    }
}

/// Exactly one frame per requested timestamp, indexed `0..expected`.
fn check_extracted(
    mut frames: Vec<ExtractedFrame>,
    expected: usize,
) -> Result<Vec<ExtractedFrame>, EngineError> {
    if frames.len() != expected {
        return Err(EngineError::FrameExtractionFailed(format!(
            "expected {expected} frames, extractor returned {}",
            frames.len()
        )));
    }
    frames.sort_by_key(|f| f.frame_index);
    if frames.iter().enumerate().any(|(i, f)| f.frame_index != i) {
        return Err(EngineError::FrameExtractionFailed(
            "extractor returned frame indices outside 0..N or duplicates".to_string(),
        ));
    }
    Ok(frames)
}

fn clamp_sub_scores(s: SubScores) -> SubScores {
    let c = |v: u8| v.min(viralscore_core::MAX_SCORE);
    SubScores {
        composition: c(s.composition),
        color_grading: c(s.color_grading),
        lighting: c(s.lighting),
        emotional_impact: c(s.emotional_impact),
        technical_quality: c(s.technical_quality),
        narrative_value: c(s.narrative_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(i: usize) -> ExtractedFrame {
        ExtractedFrame {
            frame_index: i,
            timestamp: 0.0,
            image_ref: format!("img-{i}"),
        }
    }

    #[test]
    fn fewer_frames_than_requested_fails() {
        let err = check_extracted(vec![frame(0), frame(1)], 10).unwrap_err();
        assert!(matches!(err, EngineError::FrameExtractionFailed(ref m) if m.contains("expected 10")));
    }

    #[test]
    fn duplicate_indices_fail() {
        let err = check_extracted(vec![frame(0), frame(0)], 2).unwrap_err();
        assert!(matches!(err, EngineError::FrameExtractionFailed(_)));
    }

    #[test]
    fn out_of_order_frames_are_sorted() {
        let frames = check_extracted(vec![frame(2), frame(0), frame(1)], 3).unwrap();
        let order: Vec<usize> = frames.iter().map(|f| f.frame_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn out_of_range_sub_scores_are_clamped() {
        let clamped = clamp_sub_scores(SubScores {
            composition: 140,
            ..SubScores::uniform(50)
        });
        assert_eq!(clamped.composition, 100);
        assert_eq!(clamped.lighting, 50);
    }

    #[test]
    fn low_confidence_is_not_retried() {
        assert!(!FrameFailure::LowConfidence("x".into()).is_transient());
        assert!(FrameFailure::Failed {
            reason: "503".into(),
            retriable: true
        }
        .is_transient());
    }
}
