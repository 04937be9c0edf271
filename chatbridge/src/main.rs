//! Chatbridge web server.
//!
//! Startup order:
//! - Load configuration and the signer's JWK set (fatal if either fails)
//! - Start the key refresher and the conversation sweeper
//! - Serve webhooks until SIGINT/SIGTERM, then stop the background tasks

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatbridge::{
    router, AppState, CompletionClient, Config, ConversationStore, KeySetCache, Responder,
    TokenVerifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        listen_addr = %config.listen_addr,
        model = %config.model,
        api_url = %config.api_url,
        jwks_url = %config.jwks_url,
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        http_pool_size = config.http_pool_size,
        conversation_ttl_seconds = config.conversation_ttl.as_secs(),
        max_history = config.max_history,
        has_pre_prompt = !config.pre_prompt.is_empty(),
        "config_loaded"
    );

    // One bounded pool for the completion API and the key endpoint
    let http = Client::builder()
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.http_pool_size)
        .build()
        .context("Failed to create HTTP client")?;

    let keys = KeySetCache::load(http.clone(), config.jwks_url.clone())
        .await
        .context("Failed to fetch signer JWK set")?;
    let refresher = keys.spawn_refresh(config.jwks_refresh_interval);

    let store = ConversationStore::new(config.conversation_ttl);
    let sweeper = store.spawn_sweeper(config.sweep_interval);

    let client = CompletionClient::new(http, &config.api_url, config.openai_api_key.clone());
    let responder = Responder::new(client, store, config.model.clone(), config.max_history);

    let addr = config.listen_addr;
    let state = AppState::new(config, TokenVerifier::new(keys), responder);
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    refresher.shutdown().await;
    sweeper.shutdown().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
