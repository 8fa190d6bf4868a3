use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simple_auth::config::{Config, StorageBackend};
use simple_auth::engine::SessionEngine;
use simple_auth::storage::{Database, MemoryStore, RecordStore};
use simple_auth::users::UserDirectory;
use simple_auth::{api, expiration, AppState};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "simple-auth starting");

    // Load configuration
    let config = Config::load()?;

    // Open the record store
    let store: Box<dyn RecordStore> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory record store");
            Box::new(MemoryStore::new())
        }
        StorageBackend::Redb => {
            let db = Database::open(&config.storage.data_dir)?;
            info!("Database opened at: {}", config.storage.data_dir);
            Box::new(db)
        }
    };

    let mut engine = SessionEngine::new(store, config.tokens.clone());
    if let Some(path) = &config.users_file {
        let directory = UserDirectory::load(path)?;
        info!(users = directory.len(), "Loaded user directory from {path}");
        engine = engine.with_users(Arc::new(directory));
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
    });

    // Start background tasks
    let expiration_handle = if config.tokens.cleanup_interval_seconds > 0 {
        Some(expiration::start_expiration_cleaner(Arc::clone(&state)))
    } else {
        None
    };

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = expiration_handle {
        info!("Shutting down background tasks");
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
