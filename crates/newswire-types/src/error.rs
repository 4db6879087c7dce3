//! Domain errors for Newswire

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the identity store, session resolver, content store
/// and like ledger. Conflict and validation errors are terminal for the
/// request; only `StoreUnavailable` indicates a server-side fault.
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user not found")]
    UserNotFound,

    #[error("news item '{0}' not found")]
    NewsNotFound(i64),

    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),

    /// Bad credentials and unresolved sessions both map here; the caller
    /// must not be able to tell them apart.
    #[error("authentication rejected")]
    AuthenticationRejected,

    #[error("news item '{0}' is already liked")]
    AlreadyLiked(i64),

    #[error("news item '{0}' is not liked")]
    NotLiked(i64),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}
