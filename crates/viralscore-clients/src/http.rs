//! Plumbing shared by the collaborator clients: client construction, base URL
//! normalisation, and JSON request/response handling.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::ClientError;

const USER_AGENT: &str = "viralscore/0.1 (scoring-engine)";

/// Longest error body kept in [`ClientError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, ClientError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Parse `base_url`, making sure it ends with exactly one slash so that
/// [`Url::join`] appends to the path instead of replacing its last segment.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| ClientError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ClientError> {
    base.join(path).map_err(|e| ClientError::InvalidBaseUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// Send `request`, require a 2xx status and decode the body as `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    context: &str,
    request: RequestBuilder,
) -> Result<T, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::Status {
            service,
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }
    serde_json::from_str(&body).map_err(|e| ClientError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_exactly_one_trailing_slash() {
        let base = parse_base_url("http://media.internal/api//").unwrap();
        assert_eq!(base.as_str(), "http://media.internal/api/");
        let url = endpoint(&base, "v1/probe").unwrap();
        assert_eq!(url.as_str(), "http://media.internal/api/v1/probe");
    }

    #[test]
    fn garbage_base_url_is_rejected() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
    }
}
