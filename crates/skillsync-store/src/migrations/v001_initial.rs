//! v001 -- Initial schema creation.
//!
//! Creates the three conversation tables: `conversations`,
//! `conversation_participants`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name              TEXT NOT NULL,
    kind              TEXT NOT NULL CHECK (kind IN ('individual', 'group')),
    pair_key          TEXT,                       -- canonical participant pair, individual only
    last_message      TEXT,
    last_message_time TEXT,                       -- RFC-3339, microsecond precision
    created_at        TEXT NOT NULL,

    CHECK ((kind = 'individual') = (pair_key IS NOT NULL))
);

-- At most one individual conversation per participant pair.
CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_pair_key
    ON conversations(pair_key)
    WHERE pair_key IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_conversations_last_message_time
    ON conversations(last_message_time DESC);

-- ----------------------------------------------------------------
-- Participants
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversation_participants (
    conversation_id TEXT NOT NULL,                -- FK -> conversations(id)
    email           TEXT NOT NULL,
    position        INTEGER NOT NULL,             -- insertion order

    PRIMARY KEY (conversation_id, email),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_participants_email
    ON conversation_participants(email);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id     TEXT NOT NULL,              -- FK -> conversations(id)
    seq                 INTEGER NOT NULL,           -- 1-based append order
    sender_email        TEXT NOT NULL,
    sender_display_name TEXT NOT NULL,
    content             TEXT NOT NULL,
    timestamp           TEXT NOT NULL,              -- RFC-3339, microsecond precision

    UNIQUE (conversation_id, seq),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
