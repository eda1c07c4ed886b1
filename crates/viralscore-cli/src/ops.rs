//! Commands that act on stored submissions. These load configuration from
//! the environment and talk to the database and collaborator services.

use std::sync::Arc;

use viralscore_core::{AppConfig, PlatformPatterns};
use viralscore_engine::{PipelineConfig, ScoringPipeline, SubmissionService};

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = viralscore_db::PoolConfig::from_app_config(config);
    let pool = viralscore_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

/// Wire the service the same way the server does.
async fn build_service(config: &AppConfig) -> anyhow::Result<SubmissionService> {
    let patterns = match &config.platforms_path {
        Some(path) => viralscore_core::load_platform_patterns(path)?,
        None => PlatformPatterns::default(),
    };
    let pool = connect(config).await?;
    let store = Arc::new(viralscore_db::PgSubmissionStore::new(pool));
    let (collaborators, ledger) = viralscore_clients::http_collaborators(config)?;
    let pipeline = ScoringPipeline::new(collaborators, PipelineConfig::from_app_config(config));

    Ok(SubmissionService::new(
        store,
        ledger,
        pipeline,
        Arc::new(patterns),
    ))
}

pub(crate) async fn score(id: i64, force: bool) -> anyhow::Result<()> {
    let config = viralscore_core::load_app_config()?;
    let service = build_service(&config).await?;

    let outcome = service.run_pipeline(id, force).await?;
    tracing::info!(
        submission_id = id,
        status = %outcome.status,
        viral_score = ?outcome.viral_score,
        "pipeline run finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub(crate) async fn adjust(id: i64, score: i64) -> anyhow::Result<()> {
    let config = viralscore_core::load_app_config()?;
    let service = build_service(&config).await?;

    let outcome = service.adjust_score(id, score).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub(crate) async fn migrate() -> anyhow::Result<()> {
    let config = viralscore_core::load_app_config()?;
    let pool = connect(&config).await?;
    let applied = viralscore_db::run_migrations(&pool).await?;
    println!("migrations applied: {applied}");
    Ok(())
}
