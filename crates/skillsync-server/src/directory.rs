//! Conversation creation, one-to-one deduplication and listing.

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use skillsync_shared::constants::{
    MAX_CONVERSATION_NAME_LEN, MAX_GROUP_PARTICIPANTS, MAX_MESSAGE_LEN,
};
use skillsync_shared::{ConversationKind, Principal};
use skillsync_store::{Conversation, NewMessage};

use crate::error::ApiError;
use crate::state::{lock_db, SharedDatabase};

/// Body of `POST /conversations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversation {
    pub name: String,
    #[serde(alias = "type")]
    pub kind: ConversationKind,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub initial_message: Option<String>,
}

#[derive(Debug)]
pub struct CreateOutcome {
    pub conversation: Conversation,
    /// `false` when an existing individual conversation was returned.
    pub created: bool,
}

#[derive(Clone)]
pub struct ConversationDirectory {
    db: SharedDatabase,
}

impl ConversationDirectory {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Create a conversation, or resolve the existing one-to-one thread for
    /// the same pair.
    ///
    /// When an existing individual conversation is found it is returned
    /// unchanged and `initial_message` is dropped.
    pub fn create(
        &self,
        requester: &Principal,
        request: CreateConversation,
    ) -> Result<CreateOutcome, ApiError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("Conversation name is required".into()));
        }
        if name.chars().count() > MAX_CONVERSATION_NAME_LEN {
            return Err(ApiError::Validation(format!(
                "Conversation name exceeds {MAX_CONVERSATION_NAME_LEN} characters"
            )));
        }

        let participants = normalize_participants(requester, request.participants)?;
        match request.kind {
            ConversationKind::Individual if participants.len() != 2 => {
                return Err(ApiError::Validation(format!(
                    "An individual conversation needs exactly 2 participants, got {}",
                    participants.len()
                )));
            }
            ConversationKind::Group if participants.is_empty() => {
                return Err(ApiError::Validation(
                    "A group conversation needs at least one participant".into(),
                ));
            }
            ConversationKind::Group if participants.len() > MAX_GROUP_PARTICIPANTS => {
                return Err(ApiError::Validation(format!(
                    "A group conversation allows at most {MAX_GROUP_PARTICIPANTS} participants"
                )));
            }
            _ => {}
        }

        let initial = request
            .initial_message
            .filter(|content| !content.trim().is_empty());
        if let Some(content) = &initial {
            check_content_len(content)?;
        }

        let now = Utc::now();
        let mut conversation = Conversation::new(name, request.kind, participants, now);
        let had_initial = initial.is_some();
        if let Some(content) = initial {
            conversation.push_message(
                NewMessage {
                    sender_email: requester.email.clone(),
                    sender_display_name: requester.display_name.clone(),
                    content,
                }
                .into_message(now),
            );
        }

        let mut db = lock_db(&self.db)?;
        let outcome = match request.kind {
            ConversationKind::Individual => {
                let (conversation, created) = db.create_individual_or_get(&conversation)?;
                if !created && had_initial {
                    debug!(
                        id = %conversation.id,
                        "existing conversation returned, initial message dropped"
                    );
                }
                CreateOutcome {
                    conversation,
                    created,
                }
            }
            ConversationKind::Group => {
                db.insert_conversation(&conversation)?;
                CreateOutcome {
                    conversation,
                    created: true,
                }
            }
        };

        if outcome.created {
            info!(
                id = %outcome.conversation.id,
                kind = %outcome.conversation.kind,
                by = %requester.email,
                "conversation created"
            );
        }
        Ok(outcome)
    }

    /// All conversations the principal participates in, most recently
    /// active first.
    pub fn list(&self, principal: &Principal) -> Result<Vec<Conversation>, ApiError> {
        let db = lock_db(&self.db)?;
        Ok(db.list_conversations_for(&principal.email)?)
    }
}

/// Trim, reject blanks, drop duplicates (first occurrence wins) and make
/// sure the requester is included.
fn normalize_participants(
    requester: &Principal,
    raw: Vec<String>,
) -> Result<Vec<String>, ApiError> {
    let mut participants: Vec<String> = Vec::with_capacity(raw.len() + 1);
    for email in raw {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::Validation(
                "Participant emails must not be blank".into(),
            ));
        }
        if !participants.iter().any(|p| p == email) {
            participants.push(email.to_string());
        }
    }

    if !participants.iter().any(|p| *p == requester.email) {
        participants.push(requester.email.clone());
    }
    Ok(participants)
}

pub(crate) fn check_content_len(content: &str) -> Result<(), ApiError> {
    if content.len() > MAX_MESSAGE_LEN {
        return Err(ApiError::Validation(format!(
            "Message exceeds {MAX_MESSAGE_LEN} bytes"
        )));
    }
    Ok(())
}
