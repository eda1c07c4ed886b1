//! [`SubmissionStore`] over Postgres.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;
use viralscore_core::{FrameAnalysis, SubmissionStatus, VideoSubmission};
use viralscore_engine::{
    DimensionBreakdown, NewSubmission, RunRecord, RunStatus, ScoreRecord, StoreError,
    SubmissionStore,
};

use crate::frame_analyses::{list_frame_analyses, upsert_frame_analyses};
use crate::pipeline_runs::{
    create_pipeline_run, list_pipeline_runs, update_pipeline_run, PipelineRunRow,
};
use crate::submissions::{
    find_submission_by_fingerprint_key, get_submission, get_submission_status, insert_submission,
    list_pending_submission_ids, set_submission_score, sum_duplicate_credits,
    update_submission_status,
};
use crate::DbError;

#[derive(Debug, Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Explain why a compare-and-set update touched no row.
    async fn conflict(&self, id: i64, expected: SubmissionStatus) -> StoreError {
        match get_submission_status(&self.pool, id).await {
            Ok(None) => StoreError::NotFound(id),
            Ok(Some(actual)) => match actual.parse::<SubmissionStatus>() {
                Ok(actual) => StoreError::StatusConflict {
                    id,
                    expected,
                    actual,
                },
                Err(e) => DbError::InvalidRow {
                    id,
                    column: "status",
                    reason: e.to_string(),
                }
                .into(),
            },
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, new: NewSubmission) -> Result<VideoSubmission, StoreError> {
        let row = insert_submission(&self.pool, &new).await?;
        Ok(row.into_domain()?)
    }

    async fn get(&self, id: i64) -> Result<Option<VideoSubmission>, StoreError> {
        match get_submission(&self.pool, id).await? {
            Some(row) => Ok(Some(row.into_domain()?)),
            None => Ok(None),
        }
    }

    async fn find_by_fingerprint_key(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(find_submission_by_fingerprint_key(&self.pool, key).await?)
    }

    async fn set_status(
        &self,
        id: i64,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        note: Option<&str>,
    ) -> Result<(), StoreError> {
        if update_submission_status(&self.pool, id, expected, next, note).await? {
            Ok(())
        } else {
            Err(self.conflict(id, expected).await)
        }
    }

    async fn set_score(
        &self,
        id: i64,
        expected: SubmissionStatus,
        score: u8,
        credits_granted: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        if set_submission_score(&mut conn, id, expected, score, credits_granted, None).await? {
            Ok(())
        } else {
            Err(self.conflict(id, expected).await)
        }
    }

    async fn record_score(&self, id: i64, record: &ScoreRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        let updated = set_submission_score(
            &mut tx,
            id,
            SubmissionStatus::Analyzing,
            record.viral_score,
            record.credits_granted,
            Some(&record.breakdown),
        )
        .await?;
        if !updated {
            tx.rollback().await.map_err(DbError::from)?;
            return Err(self.conflict(id, SubmissionStatus::Analyzing).await);
        }
        upsert_frame_analyses(&mut tx, id, &record.frames).await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    async fn duplicate_credits(&self, id: i64) -> Result<i64, StoreError> {
        sum_duplicate_credits(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn frames(&self, id: i64) -> Result<Vec<FrameAnalysis>, StoreError> {
        let rows = list_frame_analyses(&self.pool, id).await?;
        Ok(rows
            .into_iter()
            .map(crate::frame_analyses::FrameAnalysisRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn breakdown(&self, id: i64) -> Result<Option<DimensionBreakdown>, StoreError> {
        let row = get_submission(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        Ok(row.breakdown.map(|b| b.0))
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<i64>, StoreError> {
        Ok(list_pending_submission_ids(&self.pool, limit).await?)
    }

    async fn create_run(
        &self,
        run_id: Uuid,
        submission_id: i64,
        forced: bool,
        previous_score: Option<u8>,
    ) -> Result<(), StoreError> {
        create_pipeline_run(&self.pool, run_id, submission_id, forced, previous_score).await?;
        Ok(())
    }

    async fn update_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        update_pipeline_run(&self.pool, run_id, status, error).await?;
        Ok(())
    }

    async fn runs(&self, submission_id: i64, limit: i64) -> Result<Vec<RunRecord>, StoreError> {
        let rows = list_pipeline_runs(&self.pool, submission_id, limit).await?;
        Ok(rows
            .into_iter()
            .map(PipelineRunRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::ping(&self.pool).await.map_err(DbError::from)?;
        Ok(())
    }
}
