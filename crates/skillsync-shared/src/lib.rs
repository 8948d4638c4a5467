//! # skillsync-shared
//!
//! Types and primitives shared by the SkillSync store and server: the
//! verified caller identity ([`types::Principal`]), the conversation kind
//! tag, and the signed session token codec.

pub mod constants;
pub mod error;
pub mod session;
pub mod types;

pub use error::SessionError;
pub use types::{ConversationKind, Principal};
