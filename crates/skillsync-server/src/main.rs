//! # skillsync-server
//!
//! HTTP server for SkillSync conversations.
//!
//! This binary provides:
//! - **Session resolution** from a signed `token` cookie or bearer header
//! - **Conversation directory**: create group threads, resolve one-to-one
//!   threads without duplicates, list a user's threads
//! - **Message log**: member-only reads and atomic appends
//! - **REST API** (axum) exposing the above as JSON

mod api;
mod config;
mod directory;
mod error;
mod guard;
mod message_log;
mod session;
mod state;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use skillsync_shared::session::generate_session_secret;
use skillsync_store::Database;

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,skillsync_server=debug")),
        )
        .init();

    info!("Starting SkillSync server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let secret = match config.session_secret {
        Some(secret) => secret,
        None => {
            warn!("SESSION_SECRET not set, generating an ephemeral secret; issued tokens will not verify");
            generate_session_secret()
        }
    };

    // -----------------------------------------------------------------------
    // 3. Open the store (runs migrations)
    // -----------------------------------------------------------------------
    let database = Database::open_at(&config.database_path)?;

    let http_addr = config.http_addr;
    let app_state = AppState::new(database, secret, config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
