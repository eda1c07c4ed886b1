//! HTTP client for the credit ledger.
//!
//! The ledger owns balances and applies deltas atomically. This client only
//! forwards signed deltas and reads balances back.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use viralscore_engine::{CollaboratorError, CreditLedger};

use crate::error::ClientError;
use crate::http::{build_client, endpoint, parse_base_url, send_json};

const SERVICE: &str = "ledger";

#[derive(Debug, Serialize)]
struct DeltaRequest {
    delta: i64,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: i64,
}

/// `POST v1/users/{id}/deltas` with `{"delta"}` and
/// `GET v1/users/{id}/balance`, both answering `{"balance"}`.
pub struct LedgerClient {
    client: Client,
    base_url: Url,
}

impl LedgerClient {
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`ClientError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// # Errors
    ///
    /// [`ClientError`] on network failure, non-2xx status or a malformed body.
    pub async fn post_delta(&self, user_id: i64, delta: i64) -> Result<i64, ClientError> {
        let url = endpoint(&self.base_url, &format!("v1/users/{user_id}/deltas"))?;
        let request = self.client.post(url).json(&DeltaRequest { delta });
        let response: BalanceResponse = send_json(SERVICE, "apply delta", request).await?;
        Ok(response.balance)
    }

    /// # Errors
    ///
    /// [`ClientError`] on network failure, non-2xx status or a malformed body.
    pub async fn get_balance(&self, user_id: i64) -> Result<i64, ClientError> {
        let url = endpoint(&self.base_url, &format!("v1/users/{user_id}/balance"))?;
        let response: BalanceResponse =
            send_json(SERVICE, "balance", self.client.get(url)).await?;
        Ok(response.balance)
    }
}

#[async_trait]
impl CreditLedger for LedgerClient {
    async fn apply_delta(&self, user_id: i64, delta: i64) -> Result<i64, CollaboratorError> {
        self.post_delta(user_id, delta)
            .await
            .map_err(|e| e.into_collaborator(SERVICE))
    }

    async fn balance(&self, user_id: i64) -> Result<i64, CollaboratorError> {
        self.get_balance(user_id)
            .await
            .map_err(|e| e.into_collaborator(SERVICE))
    }
}
