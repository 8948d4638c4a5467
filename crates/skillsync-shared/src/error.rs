use thiserror::Error;

/// Reasons a session token fails verification.
///
/// These are for logs only. Callers at the HTTP boundary see a single
/// `Unauthenticated` outcome regardless of the variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session token is missing")]
    Missing,

    #[error("Session token is malformed")]
    Malformed,

    #[error("Session token signature mismatch")]
    BadSignature,

    #[error("Session token expired")]
    Expired,
}
