//! Database operations for `pipeline_runs`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use viralscore_engine::{RunRecord, RunStatus};

use crate::DbError;

/// A row from the `pipeline_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub submission_id: i64,
    pub forced: bool,
    pub status: String,
    pub previous_score: Option<i16>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PipelineRunRow {
    /// Convert into the engine's run record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] for an unknown status or an
    /// out-of-range previous score.
    pub fn into_domain(self) -> Result<RunRecord, DbError> {
        let status: RunStatus = self.status.parse().map_err(|reason| DbError::InvalidRow {
            id: self.id,
            column: "status",
            reason,
        })?;
        let previous_score = self
            .previous_score
            .map(|s| {
                u8::try_from(s).map_err(|_| DbError::InvalidRow {
                    id: self.id,
                    column: "previous_score",
                    reason: format!("{s} is not a valid score"),
                })
            })
            .transpose()?;

        Ok(RunRecord {
            run_id: self.public_id,
            submission_id: self.submission_id,
            forced: self.forced,
            status,
            previous_score,
            error: self.error_message,
            created_at: self.created_at,
        })
    }
}

const RUN_COLUMNS: &str = "id, public_id, submission_id, forced, status, previous_score, \
     started_at, completed_at, error_message, created_at";

/// Creates a run record in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_pipeline_run(
    pool: &PgPool,
    public_id: Uuid,
    submission_id: i64,
    forced: bool,
    previous_score: Option<u8>,
) -> Result<PipelineRunRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "INSERT INTO pipeline_runs (public_id, submission_id, forced, status, previous_score) \
         VALUES ($1, $2, $3, 'queued', $4) \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(submission_id)
    .bind(forced)
    .bind(previous_score.map(i16::from))
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Moves a run to `status`. `running` stamps `started_at`; the terminal
/// statuses stamp `completed_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has `public_id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_pipeline_run(
    pool: &PgPool,
    public_id: Uuid,
    status: RunStatus,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = $1, \
             error_message = $2, \
             started_at = CASE WHEN $1 = 'running' THEN NOW() ELSE started_at END, \
             completed_at = CASE WHEN $1 IN ('succeeded', 'failed', 'cancelled') \
                                 THEN NOW() ELSE completed_at END \
         WHERE public_id = $3",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(public_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Run records for a submission, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pipeline_runs(
    pool: &PgPool,
    submission_id: i64,
    limit: i64,
) -> Result<Vec<PipelineRunRow>, DbError> {
    let rows = sqlx::query_as::<_, PipelineRunRow>(&format!(
        "SELECT {RUN_COLUMNS} \
         FROM pipeline_runs \
         WHERE submission_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(submission_id)
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
