use thiserror::Error;

use tempo_client::ApiError;

/// Failures of a user-initiated send. Validation and precondition variants
/// never reach the network layer.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),

    /// Checked client-side before dispatch; the request is never sent.
    #[error("not enough credits for this request")]
    InsufficientCredits,

    /// Sends are serialized per conversation; a second send while one is in
    /// flight is rejected, never queued.
    #[error("a send is already in flight for this conversation")]
    SendInProgress,

    /// The backend throttled the turn. The optimistic user message stays in
    /// place for manual resubmission; no automatic retry is scheduled.
    #[error("the request was rate limited")]
    RateLimited,

    /// The model/service call itself failed; the optimistic user message has
    /// been rolled back.
    #[error("turn failed: {0}")]
    Turn(#[source] ApiError),
}

pub type SendResult<T> = Result<T, SendError>;
