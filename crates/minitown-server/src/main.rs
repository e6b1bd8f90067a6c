//! The minitown streaming server binary.
//!
//! Binds the well-known WebSocket endpoint on `127.0.0.1:8765`, accepts
//! one front-end client at a time, and hands the socket to the session
//! layer. All simulation work happens in tasks owned by the session.
//!
//! # Startup sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Build the LLM client from environment configuration
//! 3. Assemble the [`Services`] aggregate
//! 4. Bind and serve until terminated

mod error;
mod motion;
mod sanitize;
mod session;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use minitown_core::Services;
use minitown_llm::{LlmClient, LlmConfig};

use crate::error::ServerError;

/// The well-known endpoint the 3D client connects to.
const LISTEN_ADDR: &str = "127.0.0.1:8765";

/// Shared state for the Axum application.
#[derive(Clone)]
struct AppState {
    services: Services,
    /// One client at a time; late arrivals are turned away.
    connected: Arc<AtomicBool>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("minitown-server starting");

    let llm = Arc::new(build_llm_client());
    if llm.is_offline() {
        warn!("LLM is offline: reasoning falls back to defaults");
    }
    let mut services = Services::new(llm);
    if let Ok(path) = std::env::var("MINITOWN_SCHEDULE_FILE") {
        services.schedule_file = path.into();
    }
    if let Ok(path) = std::env::var("MINITOWN_PERSONA_DIR") {
        services.persona_dir = path.into();
    }

    let state = AppState {
        services,
        connected: Arc::new(AtomicBool::new(false)),
    };

    let router = Router::new()
        .route("/", get(ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = LISTEN_ADDR
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "WebSocket server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    Ok(())
}

/// Build the LLM client from environment variables.
///
/// `MINITOWN_OFFLINE=1` forces offline mode; `MINITOWN_OLLAMA_URL` and
/// `MINITOWN_MODEL` override the endpoint defaults.
fn build_llm_client() -> LlmClient {
    if std::env::var("MINITOWN_OFFLINE").is_ok_and(|v| v == "1") {
        return LlmClient::offline();
    }
    let mut config = LlmConfig::default();
    if let Ok(url) = std::env::var("MINITOWN_OLLAMA_URL") {
        config.api_url = Some(url);
    }
    if let Ok(model) = std::env::var("MINITOWN_MODEL") {
        config.model = model;
    }
    LlmClient::new(config)
}

/// Upgrade the HTTP request and run the session, enforcing the
/// one-client-at-a-time policy.
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if state
            .connected
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("rejecting second concurrent client");
            // Dropping the socket closes it; the engine serves one client.
            return;
        }
        session::handle_connection(socket, state.services.clone()).await;
        state.connected.store(false, Ordering::SeqCst);
    })
}
