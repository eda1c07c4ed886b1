use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platforms::Platform;
use crate::CoreError;

/// Upper bound of every score in the system (sub-scores, frame scores, viral score).
pub const MAX_SCORE: u8 = 100;

/// Lifecycle state of a [`VideoSubmission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Analyzing,
    Scored,
    Rejected,
    ManualReview,
}

impl SubmissionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Analyzing => "analyzing",
            SubmissionStatus::Scored => "scored",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::ManualReview => "manual_review",
        }
    }

    /// `scored` and `rejected` are never left by the engine on its own; only a
    /// forced re-run moves them back into `analyzing`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Scored | SubmissionStatus::Rejected)
    }

    /// Whether the state machine permits `self -> next`.
    ///
    /// | from            | to                                         |
    /// |-----------------|--------------------------------------------|
    /// | `pending`       | `analyzing`, `rejected` (duration fail-fast) |
    /// | `analyzing`     | `scored`, `rejected`, `manual_review`, `pending` (cancelled) |
    /// | `manual_review` | `analyzing` (forced), `scored` (admin score) |
    /// | `scored`        | `analyzing` (forced)                       |
    /// | `rejected`      | `analyzing` (forced)                       |
    #[must_use]
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::{Analyzing, ManualReview, Pending, Rejected, Scored};
        match (self, next) {
            (Pending, Analyzing | Rejected)
            | (Analyzing, Scored | Rejected | ManualReview | Pending)
            | (ManualReview, Analyzing | Scored)
            | (Scored | Rejected, Analyzing) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SubmissionStatus::Pending),
            "analyzing" => Ok(SubmissionStatus::Analyzing),
            "scored" => Ok(SubmissionStatus::Scored),
            "rejected" => Ok(SubmissionStatus::Rejected),
            "manual_review" => Ok(SubmissionStatus::ManualReview),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationCategory {
    Short,
    Long,
}

impl DurationCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DurationCategory::Short => "short",
            DurationCategory::Long => "long",
        }
    }
}

impl std::fmt::Display for DurationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DurationCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(DurationCategory::Short),
            "long" => Ok(DurationCategory::Long),
            other => Err(CoreError::UnknownDurationCategory(other.to_string())),
        }
    }
}

/// How many frames to extract for a video and how many of the lowest-scoring
/// ones to exclude before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingStrategy {
    pub total_extracted: usize,
    pub dropped_count: usize,
    pub scoring_frames: usize,
    pub duration_category: DurationCategory,
}

impl SamplingStrategy {
    /// Videos up to five minutes.
    pub const SHORT: Self = Self {
        total_extracted: 10,
        dropped_count: 1,
        scoring_frames: 9,
        duration_category: DurationCategory::Short,
    };

    /// Videos longer than five minutes and up to ten.
    pub const LONG: Self = Self {
        total_extracted: 12,
        dropped_count: 2,
        scoring_frames: 10,
        duration_category: DurationCategory::Long,
    };
}

/// The six per-frame quality dimensions returned by the frame grader, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubScores {
    pub composition: u8,
    pub color_grading: u8,
    pub lighting: u8,
    pub emotional_impact: u8,
    pub technical_quality: u8,
    pub narrative_value: u8,
}

impl SubScores {
    /// Every dimension set to the same value (clamped to [`MAX_SCORE`]).
    #[must_use]
    pub fn uniform(value: u8) -> Self {
        let v = value.min(MAX_SCORE);
        Self {
            composition: v,
            color_grading: v,
            lighting: v,
            emotional_impact: v,
            technical_quality: v,
            narrative_value: v,
        }
    }

    /// Dimensions in declaration order.
    #[must_use]
    pub fn as_array(&self) -> [u8; 6] {
        [
            self.composition,
            self.color_grading,
            self.lighting,
            self.emotional_impact,
            self.technical_quality,
            self.narrative_value,
        ]
    }

    #[must_use]
    pub fn min(&self) -> u8 {
        self.as_array().into_iter().min().unwrap_or(0)
    }

    #[must_use]
    pub fn max(&self) -> u8 {
        self.as_array().into_iter().max().unwrap_or(0)
    }
}

/// One sampled frame of a pipeline run, kept as an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// 0-based position in extraction order.
    pub frame_index: usize,
    /// Seconds from the start of the video.
    pub timestamp: f64,
    pub image_ref: String,
    pub sub_scores: SubScores,
    pub frame_score: u8,
    pub dropped: bool,
}

/// A link to the same video published on an external platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformLink {
    pub platform: Platform,
    pub url: String,
}

impl PlatformLink {
    #[must_use]
    pub fn new(platform: Platform, url: impl Into<String>) -> Self {
        Self {
            platform,
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSubmission {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub platform_links: Vec<PlatformLink>,
    pub screenshot_urls: Vec<String>,
    pub license_agreed: bool,
    pub video_url: String,
    pub duration_seconds: f64,
    pub status: SubmissionStatus,
    pub viral_score: Option<u8>,
    pub fingerprint: String,
    /// Earliest submission with the same fingerprint, if this one repeats it.
    #[serde(default)]
    pub duplicate_of: Option<i64>,
    /// Credits paid out for this submission so far. Duplicates share one reward.
    #[serde(default)]
    pub credits_granted: i64,
    /// Why the submission was rejected or sent to manual review, if it was.
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoSubmission {
    /// `viral_score` is present exactly when the submission is `scored`.
    #[must_use]
    pub fn is_score_consistent(&self) -> bool {
        self.viral_score.is_some() == (self.status == SubmissionStatus::Scored)
    }
}
