mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use leadgen_pipeline::{JobRunner, PgStore, Store, WebhookDispatcher, WebhookIngestor};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(leadgen_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = leadgen_db::PoolConfig::from_app_config(&config);
    let pool = leadgen_db::connect_pool(&config.database_url, pool_config).await?;
    leadgen_db::run_migrations(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let runner = Arc::new(JobRunner::from_app_config(Arc::clone(&store), &config)?);
    let dispatcher = WebhookDispatcher::new(
        Arc::clone(&store),
        Duration::from_secs(config.webhook_delivery_timeout_secs),
    )?;
    if config.crawler_webhook_secret.is_none() {
        tracing::warn!("LEADGEN_CRAWLER_WEBHOOK_SECRET not set; crawler events will be rejected");
    }
    let ingestor = Arc::new(WebhookIngestor::new(
        Arc::clone(&store),
        config.crawler_webhook_secret.clone(),
        dispatcher.clone(),
    ));

    let _scheduler = scheduler::build_scheduler(Arc::clone(&runner), dispatcher).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        leadgen_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            store,
            runner,
            ingestor,
            pool: Some(pool),
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "leadgen-server listening");
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
