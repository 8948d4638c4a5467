//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use skillsync_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, SESSION_SECRET_SIZE};
use skillsync_shared::session::SessionSecret;
use skillsync_store::Database;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `skillsync.db` in the platform data directory.
    pub database_path: PathBuf,

    /// Secret used to verify session tokens (hex-encoded, 64 chars).
    /// Env: `SESSION_SECRET`
    /// Default: none; `main` generates a per-process secret.
    pub session_secret: Option<SessionSecret>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"SkillSync"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: Database::default_path()
                .unwrap_or_else(|_| PathBuf::from("./skillsync.db")),
            session_secret: None,
            instance_name: APP_NAME.to_string(),
        }
    }
}

// Hand-written so the secret never reaches the logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field(
                "session_secret",
                &self.session_secret.map(|_| "<redacted>"),
            )
            .field("instance_name", &self.instance_name)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Ok(hex_secret) = std::env::var("SESSION_SECRET") {
            match parse_hex_secret(&hex_secret) {
                Ok(secret) => config.session_secret = Some(secret),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid SESSION_SECRET, ignoring it"
                    );
                }
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte secret.
fn parse_hex_secret(hex_str: &str) -> Result<SessionSecret, String> {
    let hex_str = hex_str.trim();
    if hex_str.len() != SESSION_SECRET_SIZE * 2 {
        return Err(format!(
            "expected {} hex chars, got {}",
            SESSION_SECRET_SIZE * 2,
            hex_str.len()
        ));
    }

    let bytes = hex::decode(hex_str).map_err(|e| format!("invalid hex: {e}"))?;
    let mut secret = [0u8; SESSION_SECRET_SIZE];
    secret.copy_from_slice(&bytes);
    Ok(secret)
}
