//! The four externally visible operations, plus run cancellation and the
//! pending sweep, wired over a store, a ledger and the scoring pipeline.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;
use viralscore_core::{
    FrameAnalysis, PlatformPatterns, SubmissionStatus, VideoSubmission, MAX_SCORE,
};

use crate::adjust::reward_owed;
use crate::aggregate::DimensionBreakdown;
use crate::collaborators::CreditLedger;
use crate::duration::validate_duration;
use crate::error::{EngineError, ErrorClass};
use crate::fingerprint::{fingerprint, fingerprint_key};
use crate::pipeline::{ScoredVideo, ScoringPipeline};
use crate::runs::{RunRegistry, RunStatus};
use crate::showcase::should_showcase;
use crate::store::{NewSubmission, RunRecord, ScoreRecord, StoreError, SubmissionStore};
use crate::validate::{validate_submission, SubmissionInput, ValidationIssue};

/// Non-blocking remarks about an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SubmitWarning {
    /// Same title and link set as an earlier submission.
    DuplicateFingerprint { existing_id: i64 },
}

impl std::fmt::Display for SubmitWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitWarning::DuplicateFingerprint { existing_id } => write!(
                f,
                "this looks like submission {existing_id} again; the same video cross-posted \
                 to several platforms is only rewarded once"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub submission_id: Option<i64>,
    pub fingerprint: String,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<SubmitWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub submission_id: i64,
    /// `None` when no pipeline run was started.
    pub run_id: Option<Uuid>,
    pub status: SubmissionStatus,
    pub viral_score: Option<u8>,
    pub credits_granted: i64,
    /// Why the run ended somewhere other than `scored`, if it did.
    pub note: Option<String>,
}

impl RunOutcome {
    fn unchanged(submission: &VideoSubmission, note: Option<String>) -> Self {
        Self {
            submission_id: submission.id,
            run_id: None,
            status: submission.status,
            viral_score: submission.viral_score,
            credits_granted: 0,
            note,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdjustOutcome {
    pub previous_score: Option<u8>,
    pub new_score: u8,
    pub credits_diff: i64,
    pub new_total_credits: i64,
}

/// Run records shown with a submission.
const VIEW_RUN_LIMIT: i64 = 20;

/// A submission together with the audit detail of its last successful run
/// and its most recent run records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionView {
    #[serde(flatten)]
    pub submission: VideoSubmission,
    pub frames: Vec<FrameAnalysis>,
    pub breakdown: Option<DimensionBreakdown>,
    pub runs: Vec<RunRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub attempted: usize,
    pub scored: usize,
    pub manual_review: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct SubmissionService {
    store: Arc<dyn SubmissionStore>,
    ledger: Arc<dyn CreditLedger>,
    pipeline: ScoringPipeline,
    patterns: Arc<PlatformPatterns>,
    runs: RunRegistry,
}

impl SubmissionService {
    #[must_use]
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        ledger: Arc<dyn CreditLedger>,
        pipeline: ScoringPipeline,
        patterns: Arc<PlatformPatterns>,
    ) -> Self {
        Self {
            store,
            ledger,
            pipeline,
            patterns,
            runs: RunRegistry::new(),
        }
    }

    #[must_use]
    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    /// Store liveness.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the store does not answer.
    pub async fn health(&self) -> Result<(), EngineError> {
        self.store.ping().await.map_err(EngineError::from)
    }

    /// Validate and store a new submission as `pending`.
    ///
    /// Scoring is not started here. A fingerprint collision with an earlier
    /// submission is reported as a warning; the submission is still accepted.
    ///
    /// # Errors
    ///
    /// Only store failures are errors. Rule violations come back in
    /// [`SubmitOutcome::errors`] with `accepted == false`.
    pub async fn submit(&self, input: SubmissionInput) -> Result<SubmitOutcome, EngineError> {
        let fingerprint = fingerprint(&input.title, &input.platform_links);
        let errors = validate_submission(&input, &self.patterns);
        if !errors.is_empty() {
            tracing::info!(
                user_id = input.user_id,
                issues = errors.len(),
                "submission rejected at intake"
            );
            return Ok(SubmitOutcome {
                accepted: false,
                submission_id: None,
                fingerprint,
                errors,
                warnings: Vec::new(),
            });
        }

        let key = fingerprint_key(&fingerprint);
        let mut warnings = Vec::new();
        let duplicate_of = self.store.find_by_fingerprint_key(&key).await?;
        if let Some(existing_id) = duplicate_of {
            tracing::warn!(
                user_id = input.user_id,
                existing_id,
                "submission fingerprint matches an earlier submission"
            );
            warnings.push(SubmitWarning::DuplicateFingerprint { existing_id });
        }

        let submission = self
            .store
            .insert(NewSubmission {
                user_id: input.user_id,
                title: input.title.trim().to_string(),
                description: input.description,
                platform_links: input.platform_links,
                screenshot_urls: input.screenshot_urls,
                license_agreed: input.license_agreed,
                video_url: input.video_url,
                duration_seconds: input.duration_seconds,
                fingerprint: fingerprint.clone(),
                fingerprint_key: key,
                duplicate_of,
            })
            .await?;

        tracing::info!(
            submission_id = submission.id,
            user_id = submission.user_id,
            "submission accepted"
        );

        Ok(SubmitOutcome {
            accepted: true,
            submission_id: Some(submission.id),
            fingerprint,
            errors: Vec::new(),
            warnings,
        })
    }

    /// Score a submission end to end and grant its reward.
    ///
    /// `pending` submissions always run. `scored`, `rejected` and
    /// `manual_review` submissions are left alone unless `force` is set. The
    /// reward is settled against what the submission and its fingerprint
    /// duplicates were already paid, so a re-run or a repeated upload only
    /// collects the tier difference. A failed forced re-run restores the old
    /// score, including one recovered from an interrupted earlier run.
    ///
    /// Input rejections and upstream failures are not errors: they move the
    /// submission to `rejected` or `manual_review` and come back as the
    /// outcome's status and note.
    ///
    /// # Errors
    ///
    /// - [`EngineError::RunInFlight`] if the submission is already being scored.
    /// - [`EngineError::SubmissionNotFound`].
    /// - [`EngineError::Cancelled`] if [`Self::cancel_run`] stopped the run.
    /// - [`EngineError::Ledger`] if the score was recorded but the reward could
    ///   not be applied.
    /// - Internal errors after the submission is parked in `manual_review`.
    pub async fn run_pipeline(&self, id: i64, force: bool) -> Result<RunOutcome, EngineError> {
        let guard = self.runs.begin(id)?;
        let submission = self.load(id).await?;
        let from = submission.status;

        match from {
            SubmissionStatus::Pending => {}
            SubmissionStatus::Analyzing if !force => {
                return Err(EngineError::InvalidTransition {
                    from,
                    to: SubmissionStatus::Analyzing,
                });
            }
            SubmissionStatus::Scored | SubmissionStatus::Rejected | SubmissionStatus::ManualReview
                if !force =>
            {
                tracing::debug!(submission_id = id, status = %from, "run skipped; not forced");
                return Ok(RunOutcome::unchanged(&submission, None));
            }
            _ => {}
        }

        let issues = validate_submission(&SubmissionInput::from(&submission), &self.patterns);
        if !issues.is_empty() {
            return self
                .reject_before_run(&submission, EngineError::ValidationFailed(issues))
                .await;
        }
        if let Err(err) = validate_duration(submission.duration_seconds) {
            return self.reject_before_run(&submission, err).await;
        }

        let previous_score = match from {
            SubmissionStatus::Scored => submission.viral_score,
            SubmissionStatus::Analyzing => self.interrupted_score(id).await?,
            _ => None,
        };

        let run_id = guard.run_id();
        self.store
            .create_run(run_id, id, force, previous_score)
            .await?;
        if from != SubmissionStatus::Analyzing {
            if let Err(err) = self
                .transition(id, from, SubmissionStatus::Analyzing, None)
                .await
            {
                self.mark_run(run_id, RunStatus::Failed, Some(&err.to_string()))
                    .await;
                return Err(err);
            }
        }
        self.mark_run(run_id, RunStatus::Running, None).await;
        tracing::info!(submission_id = id, %run_id, forced = force, "pipeline run started");

        let result = match self.pipeline.run(&submission, guard.token()).await {
            Ok(_) if guard.is_cancelled() => Err(EngineError::Cancelled(id)),
            other => other,
        };

        match result {
            Ok(scored) => {
                self.complete_run(&submission, run_id, previous_score, scored)
                    .await
            }
            Err(EngineError::Cancelled(_)) => {
                self.restore_after_cancel(&submission, previous_score).await;
                self.mark_run(run_id, RunStatus::Cancelled, None).await;
                tracing::info!(submission_id = id, %run_id, "pipeline run cancelled");
                Err(EngineError::Cancelled(id))
            }
            Err(err) => self.fail_run(&submission, run_id, previous_score, err).await,
        }
    }

    /// Ask the in-flight run for `id` to stop. Returns its run id, or `None`
    /// if nothing was running.
    #[must_use]
    pub fn cancel_run(&self, id: i64) -> Option<Uuid> {
        let cancelled = self.runs.cancel(id);
        if let Some(run_id) = cancelled {
            tracing::info!(submission_id = id, %run_id, "cancellation requested");
        }
        cancelled
    }

    /// Replace a submission's score and settle the credit difference.
    ///
    /// Works on `scored` submissions (status unchanged) and on
    /// `manual_review` submissions, which become `scored`. The credit delta is
    /// the new tier's reward, net of what fingerprint duplicates were paid,
    /// minus what this submission already received.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ScoreOutOfRange`] for a score outside `0..=100`.
    /// - [`EngineError::InvalidTransition`] for any other status.
    /// - [`EngineError::RunInFlight`] while a pipeline run is active.
    /// - [`EngineError::Ledger`] if the score was stored but the ledger failed.
    pub async fn adjust_score(&self, id: i64, new_score: i64) -> Result<AdjustOutcome, EngineError> {
        let new_score = u8::try_from(new_score)
            .ok()
            .filter(|s| *s <= MAX_SCORE)
            .ok_or(EngineError::ScoreOutOfRange(new_score))?;
        if self.runs.is_running(id) {
            return Err(EngineError::RunInFlight(id));
        }

        let submission = self.load(id).await?;
        let previous_score = match submission.status {
            SubmissionStatus::Scored => submission.viral_score,
            SubmissionStatus::ManualReview => None,
            from => {
                return Err(EngineError::InvalidTransition {
                    from,
                    to: SubmissionStatus::Scored,
                })
            }
        };

        let owed = reward_owed(new_score, self.store.duplicate_credits(id).await?);
        self.store
            .set_score(id, submission.status, new_score, owed)
            .await
            .map_err(|e| conflict_to_transition(e, SubmissionStatus::Scored))?;

        let diff = owed - submission.credits_granted;
        let balance = if diff == 0 {
            self.ledger.balance(submission.user_id).await
        } else {
            self.ledger.apply_delta(submission.user_id, diff).await
        };
        let new_total_credits = balance.map_err(|e| {
            tracing::error!(
                submission_id = id,
                user_id = submission.user_id,
                credits_diff = diff,
                error = %e,
                "score adjusted but ledger update failed"
            );
            EngineError::Ledger(e)
        })?;

        tracing::info!(
            submission_id = id,
            previous_score = ?previous_score,
            new_score,
            credits_diff = diff,
            "score adjusted"
        );

        Ok(AdjustOutcome {
            previous_score,
            new_score,
            credits_diff: diff,
            new_total_credits,
        })
    }

    /// # Errors
    ///
    /// Returns [`EngineError::SubmissionNotFound`] for an unknown id.
    pub async fn view(&self, id: i64) -> Result<SubmissionView, EngineError> {
        let submission = self.load(id).await?;
        let frames = self.store.frames(id).await?;
        let breakdown = self.store.breakdown(id).await?;
        let runs = self.store.runs(id, VIEW_RUN_LIMIT).await?;
        Ok(SubmissionView {
            submission,
            frames,
            breakdown,
            runs,
        })
    }

    /// Whether the submission belongs in the public showcase right now.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SubmissionNotFound`] for an unknown id.
    pub async fn is_showcase_eligible(&self, id: i64) -> Result<bool, EngineError> {
        let submission = self.load(id).await?;
        Ok(submission
            .viral_score
            .is_some_and(|score| should_showcase(score, submission.license_agreed, submission.status)))
    }

    /// Score up to `batch` of the oldest `pending` submissions,
    /// `concurrency` at a time. Per-submission failures are logged and counted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] only if the pending list cannot be read.
    pub async fn sweep_pending(
        &self,
        batch: i64,
        concurrency: usize,
    ) -> Result<SweepReport, EngineError> {
        let ids = self.store.list_pending(batch).await?;
        let mut report = SweepReport {
            attempted: ids.len(),
            ..SweepReport::default()
        };

        let results: Vec<(i64, Result<RunOutcome, EngineError>)> = stream::iter(ids)
            .map(|id| async move { (id, self.run_pipeline(id, false).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        for (id, result) in results {
            match result {
                Ok(outcome) => match outcome.status {
                    SubmissionStatus::Scored => report.scored += 1,
                    SubmissionStatus::ManualReview => report.manual_review += 1,
                    SubmissionStatus::Rejected => report.rejected += 1,
                    SubmissionStatus::Pending | SubmissionStatus::Analyzing => report.skipped += 1,
                },
                Err(EngineError::RunInFlight(_)) => report.skipped += 1,
                Err(err) => {
                    tracing::error!(submission_id = id, error = %err, "sweep run failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            scored = report.scored,
            manual_review = report.manual_review,
            rejected = report.rejected,
            skipped = report.skipped,
            failed = report.failed,
            "pending sweep finished"
        );
        Ok(report)
    }

    async fn load(&self, id: i64) -> Result<VideoSubmission, EngineError> {
        self.store
            .get(id)
            .await?
            .ok_or(EngineError::SubmissionNotFound(id))
    }

    /// Score replaced by the last run of a submission left in `analyzing`,
    /// for example by a process that died before the run finished.
    async fn interrupted_score(&self, id: i64) -> Result<Option<u8>, EngineError> {
        let previous = self
            .store
            .runs(id, 1)
            .await?
            .first()
            .and_then(|run| run.previous_score);
        if let Some(score) = previous {
            tracing::warn!(
                submission_id = id,
                viral_score = score,
                "recovered score replaced by an interrupted run"
            );
        }
        Ok(previous)
    }

    async fn transition(
        &self,
        id: i64,
        from: SubmissionStatus,
        to: SubmissionStatus,
        note: Option<&str>,
    ) -> Result<(), EngineError> {
        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }
        self.store
            .set_status(id, from, to, note)
            .await
            .map_err(|e| conflict_to_transition(e, to))
    }

    /// Intake or declared-duration failure found before any collaborator call.
    async fn reject_before_run(
        &self,
        submission: &VideoSubmission,
        err: EngineError,
    ) -> Result<RunOutcome, EngineError> {
        let note = err.to_string();
        if !submission.status.can_transition_to(SubmissionStatus::Rejected) {
            return Ok(RunOutcome::unchanged(submission, Some(note)));
        }
        self.transition(
            submission.id,
            submission.status,
            SubmissionStatus::Rejected,
            Some(&note),
        )
        .await?;
        tracing::info!(submission_id = submission.id, reason = %note, "submission rejected");
        Ok(RunOutcome {
            submission_id: submission.id,
            run_id: None,
            status: SubmissionStatus::Rejected,
            viral_score: None,
            credits_granted: 0,
            note: Some(note),
        })
    }

    async fn complete_run(
        &self,
        submission: &VideoSubmission,
        run_id: Uuid,
        previous_score: Option<u8>,
        scored: ScoredVideo,
    ) -> Result<RunOutcome, EngineError> {
        let id = submission.id;
        let earned_by_duplicates = match self.store.duplicate_credits(id).await {
            Ok(credits) => credits,
            Err(err) => return Err(self.abandon_run(run_id, err).await),
        };
        let owed = reward_owed(scored.viral_score, earned_by_duplicates);
        let record = ScoreRecord {
            viral_score: scored.viral_score,
            frames: scored.frames,
            breakdown: scored.breakdown,
            credits_granted: owed,
        };
        if let Err(err) = self.store.record_score(id, &record).await {
            return Err(self.abandon_run(run_id, err).await);
        }

        let credits = owed - submission.credits_granted;
        if credits != 0 {
            if let Err(err) = self.ledger.apply_delta(submission.user_id, credits).await {
                tracing::error!(
                    submission_id = id,
                    user_id = submission.user_id,
                    credits,
                    error = %err,
                    "score recorded but reward could not be applied"
                );
                self.mark_run(run_id, RunStatus::Failed, Some(&err.to_string()))
                    .await;
                return Err(EngineError::Ledger(err));
            }
        }
        self.mark_run(run_id, RunStatus::Succeeded, None).await;

        tracing::info!(
            submission_id = id,
            %run_id,
            viral_score = scored.viral_score,
            previous_score = ?previous_score,
            category = %scored.strategy.duration_category,
            credits,
            "submission scored"
        );

        Ok(RunOutcome {
            submission_id: id,
            run_id: Some(run_id),
            status: SubmissionStatus::Scored,
            viral_score: Some(scored.viral_score),
            credits_granted: credits,
            note: None,
        })
    }

    async fn fail_run(
        &self,
        submission: &VideoSubmission,
        run_id: Uuid,
        previous_score: Option<u8>,
        err: EngineError,
    ) -> Result<RunOutcome, EngineError> {
        let id = submission.id;
        let class = err.class();
        let note = err.to_string();
        match class {
            ErrorClass::Internal => {
                tracing::error!(submission_id = id, %run_id, error = %err, "fatal pipeline error");
            }
            ErrorClass::Upstream => {
                tracing::warn!(submission_id = id, %run_id, error = %err, "pipeline run failed upstream");
            }
            ErrorClass::InputRejection => {
                tracing::info!(submission_id = id, %run_id, error = %err, "pipeline run rejected input");
            }
        }
        self.mark_run(run_id, RunStatus::Failed, Some(&note)).await;

        if let Some(previous) = previous_score {
            self.store
                .set_score(
                    id,
                    SubmissionStatus::Analyzing,
                    previous,
                    submission.credits_granted,
                )
                .await?;
            tracing::warn!(
                submission_id = id,
                viral_score = previous,
                "forced re-run failed; previous score kept"
            );
            if class == ErrorClass::Internal {
                return Err(err);
            }
            return Ok(RunOutcome {
                submission_id: id,
                run_id: Some(run_id),
                status: SubmissionStatus::Scored,
                viral_score: Some(previous),
                credits_granted: 0,
                note: Some(note),
            });
        }

        let next = match class {
            ErrorClass::InputRejection => SubmissionStatus::Rejected,
            ErrorClass::Upstream | ErrorClass::Internal => SubmissionStatus::ManualReview,
        };
        self.transition(id, SubmissionStatus::Analyzing, next, Some(&note))
            .await?;
        if next == SubmissionStatus::ManualReview {
            tracing::warn!(submission_id = id, reason = %note, "submission moved to manual review");
        }
        if class == ErrorClass::Internal {
            return Err(err);
        }

        Ok(RunOutcome {
            submission_id: id,
            run_id: Some(run_id),
            status: next,
            viral_score: None,
            credits_granted: 0,
            note: Some(note),
        })
    }

    /// Put a cancelled run's submission back where it was before the run.
    async fn restore_after_cancel(&self, submission: &VideoSubmission, previous_score: Option<u8>) {
        let id = submission.id;
        let restored = match (submission.status, previous_score) {
            (SubmissionStatus::Scored | SubmissionStatus::Analyzing, Some(previous)) => self
                .store
                .set_score(
                    id,
                    SubmissionStatus::Analyzing,
                    previous,
                    submission.credits_granted,
                )
                .await
                .map_err(EngineError::from),
            (SubmissionStatus::Rejected | SubmissionStatus::ManualReview, _) => {
                self.transition(
                    id,
                    SubmissionStatus::Analyzing,
                    submission.status,
                    submission.review_note.as_deref(),
                )
                .await
            }
            _ => {
                self.transition(id, SubmissionStatus::Analyzing, SubmissionStatus::Pending, None)
                    .await
            }
        };
        if let Err(err) = restored {
            tracing::error!(submission_id = id, error = %err, "failed to restore cancelled submission");
        }
    }

    /// Mark the run failed after a store error and hand the error back.
    async fn abandon_run(&self, run_id: Uuid, err: StoreError) -> EngineError {
        self.mark_run(run_id, RunStatus::Failed, Some(&err.to_string()))
            .await;
        err.into()
    }

    async fn mark_run(&self, run_id: Uuid, status: RunStatus, error: Option<&str>) {
        if let Err(err) = self.store.update_run(run_id, status, error).await {
            tracing::error!(%run_id, %status, error = %err, "failed to update run record");
        }
    }
}

fn conflict_to_transition(err: StoreError, to: SubmissionStatus) -> EngineError {
    match err {
        StoreError::StatusConflict { actual, .. } => EngineError::InvalidTransition { from: actual, to },
        StoreError::NotFound(id) => EngineError::SubmissionNotFound(id),
        other => EngineError::Store(other),
    }
}
