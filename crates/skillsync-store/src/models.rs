//! Domain model structs persisted in the conversation database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as JSON.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use skillsync_shared::ConversationKind;

use crate::error::{Result, StoreError};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_email: String,
    pub sender_display_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Sender-supplied fields of a message that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_email: String,
    pub sender_display_name: String,
    pub content: String,
}

impl NewMessage {
    /// Stamp this message with a fresh id and `timestamp`.
    pub fn into_message(self, timestamp: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_email: self.sender_email,
            sender_display_name: self.sender_display_name,
            content: self.content,
            timestamp: store_precision(timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A one-to-one or group thread together with its ordered messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub name: String,
    pub kind: ConversationKind,
    /// Participant emails, in the order they were supplied at creation.
    pub participants: Vec<String>,
    /// Messages in append order; timestamps are non-decreasing.
    pub messages: Vec<Message>,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a fresh conversation with no messages.
    pub fn new(
        name: impl Into<String>,
        kind: ConversationKind,
        participants: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            participants,
            messages: Vec::new(),
            last_message: None,
            last_message_time: None,
            created_at: store_precision(created_at),
        }
    }

    /// Append `message` in memory and mirror it into the summary fields.
    ///
    /// Only meant for conversations that have not been persisted yet; stored
    /// conversations grow through [`Database::append_message`].
    ///
    /// [`Database::append_message`]: crate::Database::append_message
    pub fn push_message(&mut self, message: Message) {
        self.last_message = Some(message.content.clone());
        self.last_message_time = Some(message.timestamp);
        self.messages.push(message);
    }

    pub fn has_participant(&self, email: &str) -> bool {
        self.participants.iter().any(|p| p == email)
    }

    /// Canonical key for the participant pair of an individual conversation.
    pub fn pair_key(&self) -> Option<String> {
        match (self.kind, self.participants.as_slice()) {
            (ConversationKind::Individual, [a, b]) => Some(pair_key(a, b)),
            _ => None,
        }
    }

    /// Check the structural invariants the store refuses to persist without.
    pub fn validate(&self) -> Result<()> {
        if self.participants.is_empty() {
            return Err(invalid("participants must not be empty"));
        }
        for (i, p) in self.participants.iter().enumerate() {
            if self.participants[..i].contains(p) {
                return Err(invalid(format!("duplicate participant {p}")));
            }
        }
        if self.kind == ConversationKind::Individual && self.participants.len() != 2 {
            return Err(invalid(format!(
                "individual conversation needs exactly 2 participants, got {}",
                self.participants.len()
            )));
        }
        if self
            .messages
            .windows(2)
            .any(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(invalid("messages are not in timestamp order"));
        }
        let last = self.messages.last();
        if self.last_message.as_deref() != last.map(|m| m.content.as_str())
            || self.last_message_time != last.map(|m| m.timestamp)
        {
            return Err(invalid("summary fields do not mirror the last message"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> StoreError {
    StoreError::InvalidConversation(reason.into())
}

/// Order-independent key for a pair of emails.
///
/// Length-prefixed so that no two distinct pairs can produce the same key.
pub fn pair_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{lo}|{hi}", lo.len())
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Truncate to the precision timestamps are stored with.
pub fn store_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so lexical order in SQLite equals time order.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
