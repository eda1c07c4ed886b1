mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use viralscore_core::PlatformPatterns;
use viralscore_engine::{PipelineConfig, ScoringPipeline, SubmissionService};

use crate::{
    api::{build_app, default_rate_limit_state, ApiAuth, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(viralscore_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let patterns = match &config.platforms_path {
        Some(path) => viralscore_core::load_platform_patterns(path)?,
        None => PlatformPatterns::default(),
    };

    let pool_config = viralscore_db::PoolConfig::from_app_config(&config);
    let pool = viralscore_db::connect_pool(&config.database_url, pool_config).await?;
    viralscore_db::run_migrations(&pool).await?;
    let store = Arc::new(viralscore_db::PgSubmissionStore::new(pool));

    let (collaborators, ledger) = viralscore_clients::http_collaborators(&config)?;
    let pipeline = ScoringPipeline::new(collaborators, PipelineConfig::from_app_config(&config));
    let service = Arc::new(SubmissionService::new(
        store,
        ledger,
        pipeline,
        Arc::new(patterns),
    ));

    let _scheduler = scheduler::build_scheduler(Arc::clone(&service), Arc::clone(&config)).await?;

    let is_dev = config.env.is_development();
    let auth = ApiAuth {
        service: AuthState::from_env("VIRALSCORE_API_KEYS", is_dev)?,
        admin: AuthState::from_env("VIRALSCORE_ADMIN_KEYS", is_dev)?,
    };
    let app = build_app(AppState { service }, auth, default_rate_limit_state());

    tracing::info!(bind_addr = %config.bind_addr, "viralscore-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
