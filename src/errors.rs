use thiserror::Error;

/// Typed error hierarchy for palaver.
///
/// Use at module boundaries (backend calls, channel subscription, session
/// operations). Internal/leaf functions can continue using `anyhow::Result` —
/// the `Internal` variant allows seamless conversion via the `?` operator.
///
/// Nothing here is fatal: the worst case for any of these is a conversation
/// showing stale state until it is re-selected.
#[derive(Debug, Error)]
pub enum PalaverError {
    /// A network call (fetch, send, typing, read receipt) failed in a way
    /// that leaves local state untouched and open to user-initiated retry.
    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// The backend or channel delivered a unit missing required fields.
    /// The offending unit is rejected; it never partially applies.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The live channel could not be opened. Non-fatal: history still
    /// renders, live updates simply will not arrive until a re-select.
    #[error("Subscription error: {topic}: {message}")]
    Subscription { topic: String, message: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using PalaverError.
pub type PalaverResult<T> = std::result::Result<T, PalaverError>;

impl PalaverError {
    /// Whether this error is worth retrying (transient transport failures).
    pub fn is_retryable(&self) -> bool {
        match self {
            PalaverError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
