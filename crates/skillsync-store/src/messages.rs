use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{decode_ts, encode_ts, store_precision, Message, NewMessage};

impl Database {
    /// Append a message to a conversation and update its summary fields.
    ///
    /// The sequence number, message row and `last_message` /
    /// `last_message_time` are written in one write-locked transaction, so
    /// two concurrent appends can neither drop a message nor clobber each
    /// other's summary. The stored timestamp is never earlier than the
    /// conversation's current `last_message_time`.
    pub fn append_message(
        &mut self,
        conversation_id: Uuid,
        new: NewMessage,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (last_time, last_seq): (Option<String>, i64) = tx
            .query_row(
                "SELECT c.last_message_time,
                        (SELECT COALESCE(MAX(m.seq), 0) FROM messages m
                         WHERE m.conversation_id = c.id)
                 FROM conversations c
                 WHERE c.id = ?1",
                params![conversation_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;

        let mut timestamp = store_precision(now);
        if let Some(last) = last_time {
            timestamp = timestamp.max(decode_ts(&last)?);
        }

        let message = new.into_message(timestamp);
        let seq = last_seq + 1;

        insert_message(&tx, conversation_id, seq, &message)?;
        tx.execute(
            "UPDATE conversations
             SET last_message = ?1, last_message_time = ?2
             WHERE id = ?3",
            params![
                message.content,
                encode_ts(&message.timestamp),
                conversation_id.to_string(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(
            conversation = %conversation_id,
            message = %message.id,
            seq,
            "message appended"
        );
        Ok(message)
    }
}

pub(crate) fn insert_message(
    conn: &Connection,
    conversation_id: Uuid,
    seq: i64,
    message: &Message,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages
             (id, conversation_id, seq, sender_email, sender_display_name, content, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            message.id.to_string(),
            conversation_id.to_string(),
            seq,
            message.sender_email,
            message.sender_display_name,
            message.content,
            encode_ts(&message.timestamp),
        ],
    )?;
    Ok(())
}

pub(crate) fn load_messages(conn: &Connection, conversation_id: Uuid) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_email, sender_display_name, content, timestamp
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![conversation_id.to_string()], row_to_message)?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let sender_email: String = row.get(1)?;
    let sender_display_name: String = row.get(2)?;
    let content: String = row.get(3)?;
    let ts_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id,
        sender_email,
        sender_display_name,
        content,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Conversation;
    use chrono::Duration;
    use skillsync_shared::ConversationKind;
    use std::sync::{Arc, Mutex};

    fn setup() -> (Database, Uuid) {
        let mut db = Database::open_in_memory().unwrap();
        let conv = Conversation::new(
            "dm",
            ConversationKind::Individual,
            vec!["a@x.com".into(), "b@x.com".into()],
            Utc::now(),
        );
        db.insert_conversation(&conv).unwrap();
        (db, conv.id)
    }

    fn from(email: &str, content: &str) -> NewMessage {
        NewMessage {
            sender_email: email.into(),
            sender_display_name: email.split('@').next().unwrap().into(),
            content: content.into(),
        }
    }

    #[test]
    fn append_updates_summary_and_order() {
        let (mut db, id) = setup();
        let now = Utc::now();

        let m1 = db.append_message(id, from("a@x.com", "hello"), now).unwrap();
        let m2 = db
            .append_message(id, from("b@x.com", "hi back"), now + Duration::seconds(1))
            .unwrap();

        let conv = db.get_conversation(id).unwrap();
        assert_eq!(conv.messages, vec![m1, m2.clone()]);
        assert_eq!(conv.last_message.as_deref(), Some("hi back"));
        assert_eq!(conv.last_message_time, Some(m2.timestamp));
    }

    #[test]
    fn append_to_missing_conversation_fails_cleanly() {
        let (mut db, _) = setup();
        let err = db
            .append_message(Uuid::new_v4(), from("a@x.com", "x"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let (mut db, id) = setup();
        let now = Utc::now();

        let first = db.append_message(id, from("a@x.com", "later"), now).unwrap();
        let second = db
            .append_message(id, from("a@x.com", "clock stepped back"), now - Duration::minutes(5))
            .unwrap();

        assert!(second.timestamp >= first.timestamp);
        let conv = db.get_conversation(id).unwrap();
        assert_eq!(conv.messages.last().unwrap().id, second.id);
        assert_eq!(conv.last_message.as_deref(), Some("clock stepped back"));
    }

    #[test]
    fn identical_appends_are_not_deduplicated() {
        // No idempotency key exists: a retried send is stored twice.
        let (mut db, id) = setup();
        let now = Utc::now();
        db.append_message(id, from("a@x.com", "ping"), now).unwrap();
        db.append_message(id, from("a@x.com", "ping"), now).unwrap();

        assert_eq!(load_messages(db.conn(), id).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let (db, id) = setup();
        let db = Arc::new(Mutex::new(db));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let db = db.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let sender = if t % 2 == 0 { "a@x.com" } else { "b@x.com" };
                        db.lock()
                            .unwrap()
                            .append_message(id, from(sender, &format!("{t}-{i}")), Utc::now())
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let db = db.lock().unwrap();
        let conv = db.get_conversation(id).unwrap();
        assert_eq!(conv.messages.len(), 80);
        assert!(conv
            .messages
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(
            conv.last_message.as_deref(),
            Some(conv.messages.last().unwrap().content.as_str())
        );
    }

    #[test]
    fn concurrent_appends_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let conv = Conversation::new(
            "dm",
            ConversationKind::Individual,
            vec!["a@x.com".into(), "b@x.com".into()],
            Utc::now(),
        );
        Database::open_at(&path)
            .unwrap()
            .insert_conversation(&conv)
            .unwrap();

        let handles: Vec<_> = ["a@x.com", "b@x.com"]
            .into_iter()
            .map(|sender| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut db = Database::open_at(&path).unwrap();
                    for i in 0..20 {
                        db.append_message(conv.id, from(sender, &i.to_string()), Utc::now())
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        let loaded = db.get_conversation(conv.id).unwrap();
        assert_eq!(loaded.messages.len(), 40);
        assert_eq!(
            loaded.last_message.as_deref(),
            Some(loaded.messages.last().unwrap().content.as_str())
        );
    }
}
