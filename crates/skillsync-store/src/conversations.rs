//! Persistence for [`Conversation`] records.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use skillsync_shared::ConversationKind;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::{insert_message, load_messages};
use crate::models::{encode_ts, Conversation};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new conversation with its participants and any messages it
    /// already carries, as one transaction.
    ///
    /// Fails with [`StoreError::Duplicate`] if an individual conversation
    /// for the same participant pair already exists.
    pub fn insert_conversation(&mut self, conversation: &Conversation) -> Result<()> {
        conversation.validate()?;

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        write_conversation(&tx, conversation)?;
        tx.commit()?;

        tracing::debug!(
            id = %conversation.id,
            kind = %conversation.kind,
            participants = conversation.participants.len(),
            "conversation inserted"
        );
        Ok(())
    }

    /// Return the individual conversation for `conversation`'s participant
    /// pair, inserting `conversation` if none exists yet.
    ///
    /// The lookup and insert share one write-locked transaction, and the
    /// unique index on `pair_key` backs it up, so concurrent callers for the
    /// same pair always converge on a single conversation. The boolean is
    /// `true` when `conversation` was inserted.
    pub fn create_individual_or_get(
        &mut self,
        conversation: &Conversation,
    ) -> Result<(Conversation, bool)> {
        conversation.validate()?;
        let key = conversation.pair_key().ok_or_else(|| {
            StoreError::InvalidConversation("not an individual conversation".into())
        })?;

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = find_id_by_pair_key(&tx, &key)? {
            let found = load_conversation(&tx, existing)?;
            tx.commit()?;
            return Ok((found, false));
        }

        match write_conversation(&tx, conversation) {
            Ok(()) => {
                tx.commit()?;
                tracing::debug!(id = %conversation.id, "individual conversation created");
                Ok((conversation.clone(), true))
            }
            Err(StoreError::Duplicate) => {
                // The IMMEDIATE lock already serializes writers, so a pair-key
                // conflict here means the row was committed outside this
                // protocol. That row wins. A conflict on anything else, such
                // as a reused id, stays a Duplicate.
                drop(tx);
                let winner = find_id_by_pair_key(self.conn(), &key)?.ok_or(StoreError::Duplicate)?;
                tracing::debug!(id = %winner, "individual conversation resolved after conflict");
                Ok((load_conversation(self.conn(), winner)?, false))
            }
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a conversation, with participants and ordered messages.
    pub fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        load_conversation(self.conn(), id)
    }

    /// Participant emails of a conversation, without loading its messages.
    pub fn get_participants(&self, id: Uuid) -> Result<Vec<String>> {
        let exists = self
            .conn()
            .query_row(
                "SELECT 1 FROM conversations WHERE id = ?1",
                params![id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound);
        }
        load_participants(self.conn(), id)
    }

    /// List every conversation `email` participates in, most recently
    /// active first. Conversations without messages come last, newest first.
    pub fn list_conversations_for(&self, email: &str) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.name, c.kind, c.last_message, c.last_message_time, c.created_at
             FROM conversations c
             JOIN conversation_participants p ON p.conversation_id = c.id
             WHERE p.email = ?1
             ORDER BY c.last_message_time IS NULL,
                      c.last_message_time DESC,
                      c.created_at DESC",
        )?;

        let rows = stmt.query_map(params![email], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            let mut conversation = row?;
            fill_conversation(self.conn(), &mut conversation)?;
            conversations.push(conversation);
        }
        Ok(conversations)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_conversation(conn: &Connection, conversation: &Conversation) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations
             (id, name, kind, pair_key, last_message, last_message_time, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            conversation.id.to_string(),
            conversation.name,
            conversation.kind.as_str(),
            conversation.pair_key(),
            conversation.last_message,
            conversation.last_message_time.as_ref().map(encode_ts),
            encode_ts(&conversation.created_at),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate
        }
        other => StoreError::Sqlite(other),
    })?;

    let mut stmt = conn.prepare(
        "INSERT INTO conversation_participants (conversation_id, email, position)
         VALUES (?1, ?2, ?3)",
    )?;
    for (position, email) in conversation.participants.iter().enumerate() {
        stmt.execute(params![conversation.id.to_string(), email, position as i64])?;
    }

    for (i, message) in conversation.messages.iter().enumerate() {
        insert_message(conn, conversation.id, i as i64 + 1, message)?;
    }

    Ok(())
}

fn find_id_by_pair_key(conn: &Connection, key: &str) -> Result<Option<Uuid>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM conversations WHERE pair_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id.map(|s| Uuid::parse_str(&s)).transpose()?)
}

fn load_conversation(conn: &Connection, id: Uuid) -> Result<Conversation> {
    let mut conversation = conn
        .query_row(
            "SELECT id, name, kind, last_message, last_message_time, created_at
             FROM conversations
             WHERE id = ?1",
            params![id.to_string()],
            row_to_conversation,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Sqlite(other),
        })?;

    fill_conversation(conn, &mut conversation)?;
    Ok(conversation)
}

fn fill_conversation(conn: &Connection, conversation: &mut Conversation) -> Result<()> {
    conversation.participants = load_participants(conn, conversation.id)?;
    conversation.messages = load_messages(conn, conversation.id)?;
    Ok(())
}

fn load_participants(conn: &Connection, id: Uuid) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT email FROM conversation_participants
         WHERE conversation_id = ?1
         ORDER BY position ASC",
    )?;
    let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;

    let mut participants = Vec::new();
    for row in rows {
        participants.push(row?);
    }
    Ok(participants)
}

/// Map a `rusqlite::Row` to a [`Conversation`] without participants or
/// messages.
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let kind_str: String = row.get(2)?;
    let last_message: Option<String> = row.get(3)?;
    let last_time_str: Option<String> = row.get(4)?;
    let created_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let kind = ConversationKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "kind".into(), rusqlite::types::Type::Text)
    })?;

    let last_message_time = last_time_str
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    let created_at = chrono::DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Conversation {
        id,
        name,
        kind,
        participants: Vec::new(),
        messages: Vec::new(),
        last_message,
        last_message_time,
        created_at,
    })
}
