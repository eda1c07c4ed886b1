//! Database operations for `frame_analyses`, the per-frame audit trail.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use viralscore_core::{FrameAnalysis, SubScores};

use crate::DbError;

/// A row from the `frame_analyses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FrameAnalysisRow {
    pub id: i64,
    pub submission_id: i64,
    pub frame_index: i32,
    pub timestamp_seconds: f64,
    pub image_ref: String,
    pub sub_scores: Json<SubScores>,
    pub frame_score: i16,
    pub dropped: bool,
    pub created_at: DateTime<Utc>,
}

impl FrameAnalysisRow {
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] for a negative index or an
    /// out-of-range frame score.
    pub fn into_domain(self) -> Result<FrameAnalysis, DbError> {
        let frame_index = usize::try_from(self.frame_index).map_err(|_| DbError::InvalidRow {
            id: self.id,
            column: "frame_index",
            reason: format!("{} is negative", self.frame_index),
        })?;
        let frame_score = u8::try_from(self.frame_score).map_err(|_| DbError::InvalidRow {
            id: self.id,
            column: "frame_score",
            reason: format!("{} is not a valid score", self.frame_score),
        })?;

        Ok(FrameAnalysis {
            frame_index,
            timestamp: self.timestamp_seconds,
            image_ref: self.image_ref,
            sub_scores: self.sub_scores.0,
            frame_score,
            dropped: self.dropped,
        })
    }
}

/// Writes the frames of one run, keyed by `(submission_id, frame_index)`.
///
/// Frames left over from an earlier run with more frames are deleted, so
/// after this call the table holds exactly `frames` for the submission.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn upsert_frame_analyses(
    conn: &mut PgConnection,
    submission_id: i64,
    frames: &[FrameAnalysis],
) -> Result<(), DbError> {
    for frame in frames {
        let frame_index = i32::try_from(frame.frame_index).unwrap_or(i32::MAX);
        sqlx::query(
            "INSERT INTO frame_analyses \
                 (submission_id, frame_index, timestamp_seconds, image_ref, sub_scores, \
                  frame_score, dropped) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (submission_id, frame_index) DO UPDATE SET \
                 timestamp_seconds = EXCLUDED.timestamp_seconds, \
                 image_ref = EXCLUDED.image_ref, \
                 sub_scores = EXCLUDED.sub_scores, \
                 frame_score = EXCLUDED.frame_score, \
                 dropped = EXCLUDED.dropped, \
                 created_at = NOW()",
        )
        .bind(submission_id)
        .bind(frame_index)
        .bind(frame.timestamp)
        .bind(&frame.image_ref)
        .bind(Json(&frame.sub_scores))
        .bind(i16::from(frame.frame_score))
        .bind(frame.dropped)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("DELETE FROM frame_analyses WHERE submission_id = $1 AND frame_index >= $2")
        .bind(submission_id)
        .bind(i32::try_from(frames.len()).unwrap_or(i32::MAX))
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_frame_analyses(
    pool: &PgPool,
    submission_id: i64,
) -> Result<Vec<FrameAnalysisRow>, DbError> {
    let rows = sqlx::query_as::<_, FrameAnalysisRow>(
        "SELECT id, submission_id, frame_index, timestamp_seconds, image_ref, sub_scores, \
                frame_score, dropped, created_at \
         FROM frame_analyses \
         WHERE submission_id = $1 \
         ORDER BY frame_index",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
