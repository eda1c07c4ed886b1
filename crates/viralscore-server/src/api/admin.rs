use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use viralscore_engine::AdjustOutcome;

use crate::middleware::{Caller, RequestId};

use super::{map_engine_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AdjustScoreRequest {
    score: i64,
}

/// Overwrites the score of a `scored` or `manual_review` submission and
/// settles the credit difference with the ledger.
pub(super) async fn adjust_score(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(body): Json<AdjustScoreRequest>,
) -> Result<Json<ApiResponse<AdjustOutcome>>, ApiError> {
    let outcome = state
        .service
        .adjust_score(id, body.score)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    tracing::info!(
        request_id = %req_id.0,
        caller = %caller.0,
        submission_id = id,
        new_score = outcome.new_score,
        credits_diff = outcome.credits_diff,
        "admin score adjustment applied"
    );
    Ok(Json(ApiResponse::new(req_id.0, outcome)))
}
