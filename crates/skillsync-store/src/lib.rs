//! # skillsync-store
//!
//! Conversation storage for SkillSync, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for conversations and
//! their messages. Two primitives carry the concurrency guarantees the
//! messaging layer relies on:
//!
//! - [`Database::create_individual_or_get`] resolves a one-to-one thread
//!   under a uniqueness constraint on the participant pair.
//! - [`Database::append_message`] appends a message and updates the
//!   conversation summary in a single transaction.

pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
