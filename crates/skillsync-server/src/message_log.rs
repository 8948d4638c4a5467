//! Authorized reads of a single conversation and message appends.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use skillsync_shared::Principal;
use skillsync_store::{Conversation, Message, NewMessage};

use crate::directory::check_content_len;
use crate::error::ApiError;
use crate::guard::{ensure_member, ensure_participant};
use crate::state::{lock_db, SharedDatabase};

#[derive(Clone)]
pub struct MessageLog {
    db: SharedDatabase,
}

impl MessageLog {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Fetch a conversation with its ordered messages.
    pub fn get(&self, conversation_id: Uuid, principal: &Principal) -> Result<Conversation, ApiError> {
        let conversation = lock_db(&self.db)?.get_conversation(conversation_id)?;
        ensure_member(&conversation, principal)?;
        Ok(conversation)
    }

    /// Append `content` to a conversation as `principal`.
    ///
    /// Existence and membership are checked before the content.
    pub fn append(
        &self,
        conversation_id: Uuid,
        principal: &Principal,
        content: String,
    ) -> Result<Message, ApiError> {
        let mut db = lock_db(&self.db)?;

        let participants = db.get_participants(conversation_id)?;
        ensure_participant(&participants, principal)?;

        if content.trim().is_empty() {
            return Err(ApiError::Validation(
                "Message content must not be empty".into(),
            ));
        }
        check_content_len(&content)?;

        let message = db.append_message(
            conversation_id,
            NewMessage {
                sender_email: principal.email.clone(),
                sender_display_name: principal.display_name.clone(),
                content,
            },
            Utc::now(),
        )?;

        info!(
            conversation = %conversation_id,
            message = %message.id,
            sender = %message.sender_email,
            "message sent"
        );
        Ok(message)
    }
}
