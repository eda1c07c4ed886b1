use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use viralscore_engine::{RunOutcome, SubmissionInput, SubmissionView, SubmitOutcome};

use crate::middleware::RequestId;

use super::{map_engine_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
pub(super) struct RunRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct CancelledRun {
    submission_id: i64,
    run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(super) struct ShowcaseEligibility {
    submission_id: i64,
    eligible: bool,
}

/// `201` with the new id when accepted, `422` with every rule violation when not.
pub(super) async fn submit(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(input): Json<SubmissionInput>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitOutcome>>), ApiError> {
    let outcome = state
        .service
        .submit(input)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    let status = if outcome.accepted {
        StatusCode::CREATED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(ApiResponse::new(req_id.0, outcome))))
}

pub(super) async fn get_submission(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SubmissionView>>, ApiError> {
    let view = state
        .service
        .view(id)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, view)))
}

/// Runs the pipeline to completion and answers with the outcome. An empty
/// body means `{"force": false}`.
///
/// The run is spawned onto its own task, so a client that disconnects does
/// not drop it half way and leave the submission in `analyzing`.
pub(super) async fn run_pipeline(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<ApiResponse<RunOutcome>>, ApiError> {
    let request: RunRequest = if body.is_empty() {
        RunRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::new(req_id.0.clone(), "bad_request", format!("invalid run request: {e}"))
        })?
    };
    let force = request.force;
    let service = Arc::clone(&state.service);
    let outcome = tokio::spawn(async move { service.run_pipeline(id, force).await })
        .await
        .map_err(|e| {
            tracing::error!(submission_id = id, error = %e, "pipeline run task failed");
            ApiError::new(req_id.0.clone(), "internal_error", "internal error")
        })?
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, outcome)))
}

pub(super) async fn cancel_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<CancelledRun>>), ApiError> {
    match state.service.cancel_run(id) {
        Some(run_id) => Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse::new(
                req_id.0,
                CancelledRun {
                    submission_id: id,
                    run_id,
                },
            )),
        )),
        None => Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no pipeline run in flight for submission {id}"),
        )),
    }
}

pub(super) async fn showcase_eligibility(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ShowcaseEligibility>>, ApiError> {
    let eligible = state
        .service
        .is_showcase_eligible(id)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        ShowcaseEligibility {
            submission_id: id,
            eligible,
        },
    )))
}
