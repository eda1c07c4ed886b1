//! Background job scheduler.
//!
//! Registers the recurring sweep that scores submissions still `pending`
//! because nobody triggered their pipeline run.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use viralscore_core::AppConfig;
use viralscore_engine::SubmissionService;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the sweep cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    service: Arc<SubmissionService>,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sweep_job(&scheduler, service, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the pending-submission sweep on `config.sweep_cron`.
async fn register_sweep_job(
    scheduler: &JobScheduler,
    service: Arc<SubmissionService>,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let cron = config.sweep_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let service = Arc::clone(&service);
        let config = Arc::clone(&config);

        Box::pin(async move {
            tracing::info!("scheduler: starting pending sweep");
            match service
                .sweep_pending(config.sweep_batch, config.sweep_concurrency)
                .await
            {
                Ok(report) => tracing::info!(
                    attempted = report.attempted,
                    scored = report.scored,
                    failed = report.failed,
                    "scheduler: pending sweep complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: pending sweep failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered pending sweep job");
    Ok(())
}
