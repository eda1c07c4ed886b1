//! HTTP implementations of the engine's external collaborators.

pub mod error;
pub mod grader;
mod http;
pub mod ledger;
pub mod media;

use std::sync::Arc;

use viralscore_core::AppConfig;
use viralscore_engine::{Collaborators, CreditLedger};

pub use error::ClientError;
pub use grader::{GradeResponse, GraderClient};
pub use ledger::LedgerClient;
pub use media::MediaClient;

/// Build the pipeline collaborators and the ledger from configuration.
///
/// # Errors
///
/// Returns [`ClientError`] if a base URL is invalid or an HTTP client cannot
/// be constructed.
pub fn http_collaborators(
    config: &AppConfig,
) -> Result<(Collaborators, Arc<dyn CreditLedger>), ClientError> {
    let media = Arc::new(MediaClient::new(&config.media_url, config.http_timeout_secs)?);
    let grader = Arc::new(GraderClient::new(
        &config.grader_url,
        config.http_timeout_secs,
    )?);
    let ledger: Arc<dyn CreditLedger> = Arc::new(LedgerClient::new(
        &config.ledger_url,
        config.http_timeout_secs,
    )?);

    let collaborators = Collaborators {
        probe: media.clone(),
        extractor: media,
        scorer: grader,
    };
    Ok((collaborators, ledger))
}
