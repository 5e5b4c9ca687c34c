mod config;
mod db;
mod domain;
mod error;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::state::SharedState;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    let shared: SharedState = Arc::new(state::AppState::from_config(&config).await?);

    let scheduler = JobScheduler::new().await?;

    // News cache cleanup - hourly
    let shared_for_cache = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cache.clone();
            Box::pin(async move {
                match state.store.clean_old_cache().await {
                    Ok(0) => {}
                    Ok(cleaned) => tracing::info!("Removed {} expired news cache files", cleaned),
                    Err(e) => tracing::error!("News cache cleanup failed: {}", e),
                }
            })
        })?)
        .await?;

    // Rate limiter cleanup - every 10 minutes
    let shared_for_limiter = shared.clone();
    scheduler
        .add(Job::new_async("0 */10 * * * *", move |_uuid, _l| {
            let state = shared_for_limiter.clone();
            Box::pin(async move {
                state.limiter.cleanup().await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - News cache cleanup: hourly");
    tracing::info!("  - Rate limiter cleanup: every 10 min");

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
