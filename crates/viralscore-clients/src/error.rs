use thiserror::Error;
use viralscore_engine::CollaboratorError;

/// Errors returned by the collaborator HTTP clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ClientError {
    /// Whether a later attempt could succeed: timeouts, connection failures,
    /// 5xx and 429. Everything else is a hard failure.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            ClientError::Status { status, .. } => *status >= 500 || *status == 429,
            ClientError::Deserialize { .. } | ClientError::InvalidBaseUrl { .. } => false,
        }
    }

    pub(crate) fn into_collaborator(self, service: &'static str) -> CollaboratorError {
        if self.is_retriable() {
            CollaboratorError::transient(service, self.to_string())
        } else {
            CollaboratorError::rejected(service, self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> ClientError {
        ClientError::Status {
            service: "grader",
            status,
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_and_throttling_are_retriable() {
        assert!(status(500).is_retriable());
        assert!(status(503).is_retriable());
        assert!(status(429).is_retriable());
        assert!(!status(400).is_retriable());
        assert!(!status(404).is_retriable());
    }

    #[test]
    fn deserialize_errors_are_not_retriable() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ClientError::Deserialize {
            context: "grade".to_string(),
            source,
        };
        assert!(!err.is_retriable());
        assert!(matches!(
            err.into_collaborator("grader"),
            CollaboratorError::Rejected { .. }
        ));
    }

    #[test]
    fn maps_onto_collaborator_error_kinds() {
        assert!(matches!(
            status(502).into_collaborator("media"),
            CollaboratorError::Transient { service: "media", .. }
        ));
        assert!(matches!(
            status(422).into_collaborator("ledger"),
            CollaboratorError::Rejected { service: "ledger", .. }
        ));
    }
}
