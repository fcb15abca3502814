use anyhow::{Context, Result};
use axum::http::HeaderValue;
use portico::api::{create_api_router, ApiState};
use portico::config::{load_config, PorticoConfig};
use portico::credentials::CredentialStore;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portico=info".into()),
        )
        .init();

    info!("Portico starting...");

    // Load configuration (file is optional; env vars override)
    let config_path =
        std::env::var("PORTICO_CONFIG").unwrap_or_else(|_| "portico.toml".to_string());
    let mut config = if std::path::Path::new(&config_path).exists() {
        info!(path = %config_path, "Loading configuration file");
        load_config(&config_path)?
    } else {
        PorticoConfig::default()
    };

    if let Ok(db_path) = std::env::var("PORTICO_CREDENTIALS_DB") {
        config.storage.db_path = db_path;
    }
    if let Ok(port) = std::env::var("PORTICO_PORT") {
        config.server.port = port.parse().context("PORTICO_PORT must be a valid port")?;
    }

    let encryption_key = std::env::var("PORTICO_ENCRYPTION_KEY")
        .context("PORTICO_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;

    // Initialize credential store
    let store = Arc::new(
        CredentialStore::new(&config.storage.db_path, &encryption_key)
            .context("Failed to initialize credential store")?,
    );
    info!(db_path = %config.storage.db_path, "Credential store initialized");

    // Build router with CORS
    let cors = build_cors_layer(&config.server.cors_origins)?;
    let state = ApiState::new(Arc::clone(&store), config.google.clone());
    let router = create_api_router(state).layer(cors);

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port))
        .await
        .context("Failed to bind API port")?;
    info!(port = config.server.port, "Portico API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Portico stopped");

    Ok(())
}

/// Build the CORS layer from configured origins; `*` allows any origin.
fn build_cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let parsed = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(parsed))
}
