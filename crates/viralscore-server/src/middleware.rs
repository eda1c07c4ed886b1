//! Request ids, bearer auth, per-caller rate limiting and the admin audit log.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Who sent a request: a short digest of the bearer key, or `anonymous`.
///
/// The digest identifies a key in logs and rate-limit buckets without
/// revealing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller(pub String);

impl Caller {
    fn anonymous() -> Self {
        Self("anonymous".to_string())
    }

    fn from_token(token: &str) -> Self {
        let digest = Sha256::digest(token.as_bytes());
        let prefix = digest
            .iter()
            .take(6)
            .fold(0_u64, |acc, b| (acc << 8) | u64::from(*b));
        Self(format!("key:{prefix:012x}"))
    }

    /// The caller recorded by auth, or one read from the bearer header.
    fn of(req: &Request) -> Self {
        if let Some(caller) = req.extensions().get::<Caller>() {
            return caller.clone();
        }
        extract_bearer_token(req.headers().get(AUTHORIZATION))
            .map_or_else(Self::anonymous, Self::from_token)
    }
}

/// Bearer key set for one group of routes.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Reads the comma-separated bearer keys in `var`.
    ///
    /// Missing keys disable auth in development and fail startup elsewhere.
    pub fn from_env(var: &str, is_development: bool) -> anyhow::Result<Self> {
        Self::from_raw(var, std::env::var(var).ok().as_deref(), is_development)
    }

    pub fn from_raw(var: &str, raw: Option<&str>, is_development: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if keys.is_empty() {
            if is_development {
                tracing::warn!(var, "no bearer keys set; auth disabled in development environment");
                return Ok(Self::disabled());
            }
            anyhow::bail!("{var} is required outside development; provide comma-separated bearer tokens");
        }

        tracing::info!(var, keys = keys.len(), "bearer keys loaded");
        Ok(Self {
            api_keys: Arc::new(keys),
            enabled: true,
        })
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            api_keys: Arc::new(HashSet::new()),
            enabled: false,
        }
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter with one window per caller.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<Caller, RateLimitWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `caller`; `false` once its window is full.
    async fn admit(&self, caller: &Caller) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows.retain(|_, w| now.duration_since(w.started_at) < self.window);

        let window = windows.entry(caller.clone()).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

fn middleware_error(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(MiddlewareErrorBody {
            error: MiddlewareError { code, message },
        }),
    )
        .into_response()
}

/// Uses the incoming `x-request-id` or a fresh `UUIDv4`, exposes it as a
/// [`RequestId`] extension and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Rejects requests without an accepted bearer key and records the
/// [`Caller`] for the handlers.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_bearer_token(req.headers().get(AUTHORIZATION));
    let caller = match token {
        Some(token) if auth.allows(token) => Caller::from_token(token),
        _ if !auth.enabled => Caller::of(&req),
        _ => {
            return middleware_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid bearer token",
            )
        }
    };
    req.extensions_mut().insert(caller);
    next.run(req).await
}

/// Applies the caller's request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let caller = Caller::of(&req);
    if !rate_limit.admit(&caller).await {
        tracing::warn!(caller = %caller.0, "rate limit exceeded");
        return middleware_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }
    next.run(req).await
}

/// Writes one `audit` event per admin request, refused ones included.
pub async fn audit_admin_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();
    let caller = Caller::of(&req);

    let res = next.run(req).await;

    tracing::info!(
        target: "audit",
        request_id = %request_id,
        caller = %caller.0,
        %method,
        path = %path,
        status = res.status().as_u16(),
        "admin request"
    );
    res
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn empty_keys_disable_auth_only_in_development() {
        let dev = AuthState::from_raw("VIRALSCORE_API_KEYS", None, true).unwrap();
        assert!(!dev.enabled);

        let err = AuthState::from_raw("VIRALSCORE_ADMIN_KEYS", Some(" , "), false).unwrap_err();
        assert!(err.to_string().contains("VIRALSCORE_ADMIN_KEYS"));
    }

    #[test]
    fn keys_are_trimmed_and_split() {
        let state = AuthState::from_raw("VIRALSCORE_API_KEYS", Some(" a1 ,b2,, "), false).unwrap();
        assert!(state.enabled);
        assert!(state.allows("a1"));
        assert!(state.allows("b2"));
        assert!(!state.allows(""));
    }

    #[test]
    fn caller_digest_is_stable_and_hides_the_key() {
        let a = Caller::from_token("admin-key");
        assert_eq!(a, Caller::from_token("admin-key"));
        assert_ne!(a, Caller::from_token("svc-key"));
        assert!(a.0.starts_with("key:"));
        assert_eq!(a.0.len(), "key:".len() + 12);
        assert!(!a.0.contains("admin"));
    }

    #[tokio::test]
    async fn each_caller_gets_its_own_window() {
        let limit = RateLimitState::new(2, Duration::from_secs(60));
        let (a, b) = (Caller::from_token("a"), Caller::from_token("b"));

        assert!(limit.admit(&a).await);
        assert!(limit.admit(&a).await);
        assert!(!limit.admit(&a).await);
        assert!(limit.admit(&b).await);
        assert!(limit.admit(&Caller::anonymous()).await);
    }

    #[tokio::test]
    async fn expired_windows_start_over() {
        let limit = RateLimitState::new(1, Duration::from_millis(10));
        let caller = Caller::from_token("a");

        assert!(limit.admit(&caller).await);
        assert!(!limit.admit(&caller).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limit.admit(&caller).await);
    }
}
