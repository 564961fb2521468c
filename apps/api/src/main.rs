mod config;
mod db;
mod errors;
mod models;
mod routes;
mod state;
mod store;
mod vault;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, PostgresConfig, StoreBackend};
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgRemoteStore, RemoteStore, RestRemoteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Vault API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;
    info!(
        "Accepting {} up to {} bytes",
        config.accepted_file_types, config.max_upload_bytes
    );

    // Build app state (mounts the submissions table and its change subscription)
    let state = AppState::new(store, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Constructs the remote store selected by `STORE_BACKEND`.
async fn build_store(config: &Config) -> Result<Arc<dyn RemoteStore>> {
    let store: Arc<dyn RemoteStore> = match &config.backend {
        StoreBackend::Postgres(pg) => {
            let pool = create_pool(&pg.database_url).await?;
            run_migrations(&pool).await?;
            let s3 = build_s3_client(pg).await;
            info!("S3 client initialized (bucket: {})", pg.s3_bucket);
            Arc::new(PgRemoteStore::new(
                pool,
                s3,
                pg.s3_bucket.clone(),
                pg.s3_public_base_url.clone(),
            ))
        }
        StoreBackend::Rest(rest) => {
            info!("Using hosted store at {}", rest.url);
            Arc::new(RestRemoteStore::new(
                &rest.url,
                rest.api_key.clone(),
                rest.bucket.clone(),
                rest.poll_interval,
            )?)
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; submissions are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &PostgresConfig) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resume-vault-static",
    );

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not by subdomain.
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
