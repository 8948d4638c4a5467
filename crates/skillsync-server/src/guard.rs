use tracing::warn;

use skillsync_shared::Principal;
use skillsync_store::Conversation;

use crate::error::ApiError;

/// Fail with [`ApiError::Forbidden`] unless `principal` participates in
/// `conversation`.
pub fn ensure_member(conversation: &Conversation, principal: &Principal) -> Result<(), ApiError> {
    ensure_participant(&conversation.participants, principal)
}

/// Membership check against a bare participant list.
pub fn ensure_participant(participants: &[String], principal: &Principal) -> Result<(), ApiError> {
    if participants.iter().any(|p| *p == principal.email) {
        Ok(())
    } else {
        warn!(user = %principal.email, "access to conversation denied");
        Err(ApiError::Forbidden)
    }
}
