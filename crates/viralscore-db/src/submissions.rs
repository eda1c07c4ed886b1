//! Database operations for `video_submissions`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use viralscore_core::{PlatformLink, SubmissionStatus, VideoSubmission};
use viralscore_engine::{DimensionBreakdown, NewSubmission};

use crate::DbError;

const SUBMISSION_COLUMNS: &str = "id, user_id, title, description, platform_links, screenshot_urls, \
     license_agreed, video_url, duration_seconds, status, viral_score, fingerprint, \
     fingerprint_key, duplicate_of, credits_granted, review_note, breakdown, created_at, \
     updated_at";

/// A row from the `video_submissions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubmissionRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub platform_links: Json<Vec<PlatformLink>>,
    pub screenshot_urls: Json<Vec<String>>,
    pub license_agreed: bool,
    pub video_url: String,
    pub duration_seconds: f64,
    pub status: String,
    pub viral_score: Option<i16>,
    pub fingerprint: String,
    pub fingerprint_key: String,
    pub duplicate_of: Option<i64>,
    pub credits_granted: i64,
    pub review_note: Option<String>,
    pub breakdown: Option<Json<DimensionBreakdown>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    /// Convert into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] for an unknown status or an
    /// out-of-range score.
    pub fn into_domain(self) -> Result<VideoSubmission, DbError> {
        let status: SubmissionStatus = self.status.parse().map_err(|e: viralscore_core::CoreError| {
            DbError::InvalidRow {
                id: self.id,
                column: "status",
                reason: e.to_string(),
            }
        })?;
        let viral_score = self
            .viral_score
            .map(|s| {
                u8::try_from(s).map_err(|_| DbError::InvalidRow {
                    id: self.id,
                    column: "viral_score",
                    reason: format!("{s} is not a valid score"),
                })
            })
            .transpose()?;

        Ok(VideoSubmission {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            platform_links: self.platform_links.0,
            screenshot_urls: self.screenshot_urls.0,
            license_agreed: self.license_agreed,
            video_url: self.video_url,
            duration_seconds: self.duration_seconds,
            status,
            viral_score,
            fingerprint: self.fingerprint,
            duplicate_of: self.duplicate_of,
            credits_granted: self.credits_granted,
            review_note: self.review_note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Inserts a new submission in `pending` status and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_submission(pool: &PgPool, new: &NewSubmission) -> Result<SubmissionRow, DbError> {
    let row = sqlx::query_as::<_, SubmissionRow>(&format!(
        "INSERT INTO video_submissions \
             (user_id, title, description, platform_links, screenshot_urls, license_agreed, \
              video_url, duration_seconds, fingerprint, fingerprint_key, duplicate_of) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(new.user_id)
    .bind(&new.title)
    .bind(new.description.as_deref())
    .bind(Json(&new.platform_links))
    .bind(Json(&new.screenshot_urls))
    .bind(new.license_agreed)
    .bind(&new.video_url)
    .bind(new.duration_seconds)
    .bind(&new.fingerprint)
    .bind(&new.fingerprint_key)
    .bind(new.duplicate_of)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_submission(pool: &PgPool, id: i64) -> Result<Option<SubmissionRow>, DbError> {
    let row = sqlx::query_as::<_, SubmissionRow>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM video_submissions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Id of the earliest submission with this fingerprint key.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_submission_by_fingerprint_key(
    pool: &PgPool,
    fingerprint_key: &str,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM video_submissions WHERE fingerprint_key = $1 ORDER BY id LIMIT 1",
    )
    .bind(fingerprint_key)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Current status string of a submission, if it exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_submission_status(pool: &PgPool, id: i64) -> Result<Option<String>, DbError> {
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM video_submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(status)
}

/// Compare-and-set status update. Leaving `scored` clears the score.
///
/// Returns `false` if the row does not exist or is not in `expected`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_submission_status(
    pool: &PgPool,
    id: i64,
    expected: SubmissionStatus,
    next: SubmissionStatus,
    review_note: Option<&str>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE video_submissions \
         SET status = $1, \
             viral_score = CASE WHEN $1 = 'scored' THEN viral_score ELSE NULL END, \
             review_note = $2, \
             updated_at = NOW() \
         WHERE id = $3 AND status = $4",
    )
    .bind(next.as_str())
    .bind(review_note)
    .bind(id)
    .bind(expected.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Moves a submission from `expected` to `scored` with `score` and the
/// credits paid for it, optionally replacing the stored breakdown.
///
/// Returns `false` if the row does not exist or is not in `expected`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_submission_score(
    conn: &mut PgConnection,
    id: i64,
    expected: SubmissionStatus,
    score: u8,
    credits_granted: i64,
    breakdown: Option<&DimensionBreakdown>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE video_submissions \
         SET status = 'scored', \
             viral_score = $1, \
             credits_granted = $2, \
             breakdown = COALESCE($3, breakdown), \
             review_note = NULL, \
             updated_at = NOW() \
         WHERE id = $4 AND status = $5",
    )
    .bind(i16::from(score))
    .bind(credits_granted)
    .bind(breakdown.map(Json))
    .bind(id)
    .bind(expected.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Credits paid to the other submissions sharing `id`'s fingerprint key.
///
/// Returns `None` if `id` does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sum_duplicate_credits(pool: &PgPool, id: i64) -> Result<Option<i64>, DbError> {
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(other.credits_granted), 0)::BIGINT \
         FROM video_submissions AS own \
         LEFT JOIN video_submissions AS other \
                ON other.fingerprint_key = own.fingerprint_key AND other.id <> own.id \
         WHERE own.id = $1 \
         GROUP BY own.id",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(total)
}

/// Ids of the oldest `pending` submissions.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_submission_ids(pool: &PgPool, limit: i64) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM video_submissions \
         WHERE status = 'pending' \
         ORDER BY created_at, id \
         LIMIT $1",
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
