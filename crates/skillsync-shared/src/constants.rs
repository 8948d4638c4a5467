/// Application name
pub const APP_NAME: &str = "SkillSync";

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE_NAME: &str = "token";

/// Session token lifetime in seconds (7 days)
pub const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Session secret size in bytes (BLAKE3 keyed-hash key)
pub const SESSION_SECRET_SIZE: usize = 32;

/// Maximum message content size in bytes (64 KiB)
pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// Maximum conversation name length in characters
pub const MAX_CONVERSATION_NAME_LEN: usize = 200;

/// Maximum number of participants in a group conversation
pub const MAX_GROUP_PARTICIPANTS: usize = 256;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Key derivation context for session MACs (BLAKE3)
pub const KDF_CONTEXT_SESSION_MAC: &str = "skillsync-session-mac-v1";
