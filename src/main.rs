//! alumni-hub server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use alumni_hub::api;
use alumni_hub::app_state::AppState;
use alumni_hub::config::{self, ServiceConfig};
use alumni_hub::domain::{ActivityBus, Store};
use alumni_hub::persistence::{PersistenceHandle, PostgresPersistence, worker};

/// How often old activity-log rows are pruned.
const RETENTION_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Upper bound on flushing queued writes at shutdown.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config::log_format_is_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = ServiceConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, ?config, "starting alumni-hub");

    // Build domain layer
    let store = Arc::new(Store::new());
    let bus = ActivityBus::new(config.activity_bus_capacity);

    // Persistence: restore state, then start the background tasks
    let (persistence, db, writer) = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        let db = PostgresPersistence::new(pool);
        db.migrate().await?;

        let records = db.load_records().await?;
        let restored = records.len();
        worker::restore(&mut *store.write().await, records);
        tracing::info!(records = restored, "state restored from database");

        let (handle, receiver) = PersistenceHandle::channel(config.persistence_channel_capacity);
        let writer = worker::spawn_writer(db.clone(), receiver);
        if config.activity_log_enabled {
            worker::spawn_activity_logger(db.clone(), &bus);
        }
        if config.activity_log_retention_days > 0 {
            worker::spawn_retention(
                db.clone(),
                config.activity_log_retention_days,
                RETENTION_INTERVAL,
            );
        }
        (handle, Some(db), Some(writer))
    } else {
        tracing::warn!("persistence disabled; state lives in memory only");
        (PersistenceHandle::disabled(), None, None)
    };

    // Build application state and router
    let app_state = AppState::build(&config, store, bus, persistence, db)?;
    let app = api::build_app(app_state, &config);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last persistence senders; the writer now sees the
    // channel close once its queue is empty.
    if let Some(writer) = writer
        && worker::drain_writer(writer, WRITER_DRAIN_TIMEOUT).await
    {
        tracing::info!("pending changes flushed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
