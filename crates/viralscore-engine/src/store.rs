//! Persistence seam for submissions, their frame audit trail and run records.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use viralscore_core::{FrameAnalysis, PlatformLink, SubmissionStatus, VideoSubmission};

use crate::aggregate::DimensionBreakdown;
use crate::runs::RunStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("submission {0} not found")]
    NotFound(i64),

    /// A compare-and-set status update found a different status than expected.
    #[error("submission {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: i64,
        expected: SubmissionStatus,
        actual: SubmissionStatus,
    },

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A validated submission ready to be stored as `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub platform_links: Vec<PlatformLink>,
    pub screenshot_urls: Vec<String>,
    pub license_agreed: bool,
    pub video_url: String,
    pub duration_seconds: f64,
    pub fingerprint: String,
    pub fingerprint_key: String,
    pub duplicate_of: Option<i64>,
}

/// Everything a successful pipeline run writes back.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub viral_score: u8,
    pub frames: Vec<FrameAnalysis>,
    pub breakdown: DimensionBreakdown,
    /// Total credits owed for the submission at this score.
    pub credits_granted: i64,
}

/// Storage operations the engine needs.
///
/// Status changes are compare-and-set on the expected current status, so two
/// writers racing on one submission cannot both win. Moving to any status
/// other than `scored` clears the viral score.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, new: NewSubmission) -> Result<VideoSubmission, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<VideoSubmission>, StoreError>;

    /// Id of the earliest submission with this fingerprint key, if any.
    async fn find_by_fingerprint_key(&self, key: &str) -> Result<Option<i64>, StoreError>;

    async fn set_status(
        &self,
        id: i64,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        note: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Set the score and the credits paid for it, moving to `scored` and
    /// leaving the frame audit trail alone.
    async fn set_score(
        &self,
        id: i64,
        expected: SubmissionStatus,
        score: u8,
        credits_granted: i64,
    ) -> Result<(), StoreError>;

    /// Record a pipeline result: `analyzing -> scored`, replacing the frames.
    async fn record_score(&self, id: i64, record: &ScoreRecord) -> Result<(), StoreError>;

    /// Credits already paid to the other submissions sharing `id`'s fingerprint.
    async fn duplicate_credits(&self, id: i64) -> Result<i64, StoreError>;

    async fn frames(&self, id: i64) -> Result<Vec<FrameAnalysis>, StoreError>;

    async fn breakdown(&self, id: i64) -> Result<Option<DimensionBreakdown>, StoreError>;

    /// Oldest `pending` submissions first.
    async fn list_pending(&self, limit: i64) -> Result<Vec<i64>, StoreError>;

    /// Open a `queued` run record. `previous_score` is the score the run
    /// replaces, kept so an interrupted forced run can be recovered.
    async fn create_run(
        &self,
        run_id: Uuid,
        submission_id: i64,
        forced: bool,
        previous_score: Option<u8>,
    ) -> Result<(), StoreError>;

    async fn update_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Run records for a submission, newest first.
    async fn runs(&self, submission_id: i64, limit: i64) -> Result<Vec<RunRecord>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// A stored run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub submission_id: i64,
    pub forced: bool,
    pub status: RunStatus,
    pub previous_score: Option<u8>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    submissions: HashMap<i64, VideoSubmission>,
    fingerprint_keys: HashMap<i64, String>,
    frames: HashMap<i64, Vec<FrameAnalysis>>,
    breakdowns: HashMap<i64, DimensionBreakdown>,
    runs: Vec<RunRecord>,
}

/// Process-local store for tests, the CLI's offline mode and local development.
#[derive(Default)]
pub struct InMemorySubmissionStore {
    tables: Mutex<Tables>,
}

impl InMemorySubmissionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut guard = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run records for a submission, oldest first.
    #[must_use]
    pub fn runs_for(&self, submission_id: i64) -> Vec<RunRecord> {
        self.with(|t| {
            t.runs
                .iter()
                .filter(|r| r.submission_id == submission_id)
                .cloned()
                .collect()
        })
    }
}

fn transition(
    submission: &mut VideoSubmission,
    expected: SubmissionStatus,
    next: SubmissionStatus,
) -> Result<(), StoreError> {
    if submission.status != expected {
        return Err(StoreError::StatusConflict {
            id: submission.id,
            expected,
            actual: submission.status,
        });
    }
    submission.status = next;
    if next != SubmissionStatus::Scored {
        submission.viral_score = None;
    }
    submission.updated_at = Utc::now();
    Ok(())
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn insert(&self, new: NewSubmission) -> Result<VideoSubmission, StoreError> {
        Ok(self.with(|t| {
            t.next_id += 1;
            let id = t.next_id;
            let now = Utc::now();
            let submission = VideoSubmission {
                id,
                user_id: new.user_id,
                title: new.title,
                description: new.description,
                platform_links: new.platform_links,
                screenshot_urls: new.screenshot_urls,
                license_agreed: new.license_agreed,
                video_url: new.video_url,
                duration_seconds: new.duration_seconds,
                status: SubmissionStatus::Pending,
                viral_score: None,
                fingerprint: new.fingerprint,
                duplicate_of: new.duplicate_of,
                credits_granted: 0,
                review_note: None,
                created_at: now,
                updated_at: now,
            };
            t.fingerprint_keys.insert(id, new.fingerprint_key);
            t.submissions.insert(id, submission.clone());
            submission
        }))
    }

    async fn get(&self, id: i64) -> Result<Option<VideoSubmission>, StoreError> {
        Ok(self.with(|t| t.submissions.get(&id).cloned()))
    }

    async fn find_by_fingerprint_key(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.with(|t| {
            t.fingerprint_keys
                .iter()
                .filter(|(_, k)| k.as_str() == key)
                .map(|(id, _)| *id)
                .min()
        }))
    }

    async fn set_status(
        &self,
        id: i64,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        note: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with(|t| {
            let submission = t.submissions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            transition(submission, expected, next)?;
            submission.review_note = note.map(str::to_string);
            Ok(())
        })
    }

    async fn set_score(
        &self,
        id: i64,
        expected: SubmissionStatus,
        score: u8,
        credits_granted: i64,
    ) -> Result<(), StoreError> {
        self.with(|t| {
            let submission = t.submissions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            transition(submission, expected, SubmissionStatus::Scored)?;
            submission.viral_score = Some(score);
            submission.credits_granted = credits_granted;
            submission.review_note = None;
            Ok(())
        })
    }

    async fn record_score(&self, id: i64, record: &ScoreRecord) -> Result<(), StoreError> {
        self.with(|t| {
            let submission = t.submissions.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            transition(submission, SubmissionStatus::Analyzing, SubmissionStatus::Scored)?;
            submission.viral_score = Some(record.viral_score);
            submission.credits_granted = record.credits_granted;
            submission.review_note = None;
            t.frames.insert(id, record.frames.clone());
            t.breakdowns.insert(id, record.breakdown);
            Ok(())
        })
    }

    async fn duplicate_credits(&self, id: i64) -> Result<i64, StoreError> {
        self.with(|t| {
            let key = t.fingerprint_keys.get(&id).ok_or(StoreError::NotFound(id))?;
            Ok(t.fingerprint_keys
                .iter()
                .filter(|(other, k)| **other != id && *k == key)
                .filter_map(|(other, _)| t.submissions.get(other))
                .map(|s| s.credits_granted)
                .sum())
        })
    }

    async fn frames(&self, id: i64) -> Result<Vec<FrameAnalysis>, StoreError> {
        Ok(self.with(|t| t.frames.get(&id).cloned().unwrap_or_default()))
    }

    async fn breakdown(&self, id: i64) -> Result<Option<DimensionBreakdown>, StoreError> {
        Ok(self.with(|t| t.breakdowns.get(&id).copied()))
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<i64>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.with(|t| {
            let mut pending: Vec<&VideoSubmission> = t
                .submissions
                .values()
                .filter(|s| s.status == SubmissionStatus::Pending)
                .collect();
            pending.sort_by_key(|s| (s.created_at, s.id));
            pending.into_iter().take(limit).map(|s| s.id).collect()
        }))
    }

    async fn create_run(
        &self,
        run_id: Uuid,
        submission_id: i64,
        forced: bool,
        previous_score: Option<u8>,
    ) -> Result<(), StoreError> {
        self.with(|t| {
            t.runs.push(RunRecord {
                run_id,
                submission_id,
                forced,
                status: RunStatus::Queued,
                previous_score,
                error: None,
                created_at: Utc::now(),
            });
        });
        Ok(())
    }

    async fn update_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with(|t| {
            let run = t
                .runs
                .iter_mut()
                .find(|r| r.run_id == run_id)
                .ok_or_else(|| StoreError::Backend(format!("run {run_id} not found").into()))?;
            run.status = status;
            run.error = error.map(str::to_string);
            Ok(())
        })
    }

    async fn runs(&self, submission_id: i64, limit: i64) -> Result<Vec<RunRecord>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut runs = self.runs_for(submission_id);
        runs.reverse();
        runs.truncate(limit);
        Ok(runs)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
