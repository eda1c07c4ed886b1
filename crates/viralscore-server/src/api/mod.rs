mod admin;
mod submissions;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use viralscore_engine::{EngineError, ErrorClass, SubmissionService};

use crate::middleware::{
    audit_admin_request, enforce_rate_limit, request_id, require_bearer_auth, AuthState,
    RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SubmissionService>,
}

/// Bearer key sets for the two route groups.
#[derive(Debug, Clone)]
pub struct ApiAuth {
    pub service: AuthState,
    pub admin: AuthState,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_failed" | "score_out_of_range" | "invalid_duration"
            | "duration_exceeded" => StatusCode::BAD_REQUEST,
            "conflict" | "invalid_transition" | "run_in_flight" | "cancelled" => {
                StatusCode::CONFLICT
            }
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "ledger_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Engine errors keep their own code. Internal errors are logged and their
/// detail is not sent to the caller.
pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error.class() {
        ErrorClass::Internal => {
            tracing::error!(error = %error, "request failed with an internal engine error");
            ApiError::new(request_id, "internal_error", "internal error")
        }
        ErrorClass::Upstream => {
            tracing::warn!(error = %error, "request failed upstream");
            ApiError::new(request_id, error.code(), error.to_string())
        }
        ErrorClass::InputRejection => ApiError::new(request_id, error.code(), error.to_string()),
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn service_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/submissions", post(submissions::submit))
        .route("/api/v1/submissions/{id}", get(submissions::get_submission))
        .route(
            "/api/v1/submissions/{id}/runs",
            post(submissions::run_pipeline).delete(submissions::cancel_run),
        )
        .route(
            "/api/v1/submissions/{id}/showcase",
            get(submissions::showcase_eligibility),
        )
        .layer(axum::middleware::from_fn_with_state(auth, require_bearer_auth))
}

fn admin_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/admin/submissions/{id}/score",
            put(admin::adjust_score),
        )
        .layer(axum::middleware::from_fn_with_state(auth, require_bearer_auth))
        .layer(axum::middleware::from_fn(audit_admin_request))
}

pub fn build_app(state: AppState, auth: ApiAuth, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));
    let protected_routes = Router::new()
        .merge(service_router(auth.service))
        .merge(admin_router(auth.admin))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match state.service.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                req_id.0,
                HealthData {
                    status: "ok",
                    database: "ok",
                },
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    req_id.0,
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                )),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
