//! Application state shared across all request handlers.

use std::sync::{Arc, Mutex, MutexGuard};

use skillsync_shared::session::SessionSecret;
use skillsync_store::Database;

use crate::config::ServerConfig;
use crate::directory::ConversationDirectory;
use crate::error::ApiError;
use crate::message_log::MessageLog;
use crate::session::SessionResolver;

/// The single store handle. The mutex serializes all store operations.
pub type SharedDatabase = Arc<Mutex<Database>>;

pub fn lock_db(db: &SharedDatabase) -> Result<MutexGuard<'_, Database>, ApiError> {
    db.lock()
        .map_err(|_| ApiError::Internal("database lock poisoned".into()))
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionResolver,
    pub directory: ConversationDirectory,
    pub messages: MessageLog,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, secret: SessionSecret, config: ServerConfig) -> Self {
        let db: SharedDatabase = Arc::new(Mutex::new(db));
        Self {
            sessions: SessionResolver::new(secret),
            directory: ConversationDirectory::new(db.clone()),
            messages: MessageLog::new(db),
            config: Arc::new(config),
        }
    }
}
