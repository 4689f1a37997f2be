//! Error taxonomy for the realtime core.
//!
//! Every failure a client-initiated operation can hit falls into one of
//! these categories. All of them are surfaced to the initiating client as a
//! single `error{message}` event; none are swallowed silently. Side-channel
//! failures (a notification missing an offline user) are logged and dropped
//! by the caller, never turned into a `GatewayError`.

use thiserror::Error;

use super::AuthError;

/// Failures surfaced to a connected client or REST caller.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Missing, invalid, or expired credential. The connection is refused
    /// before any state is created.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Tier or role insufficient, or the caller is not a participant. The
    /// operation is refused; the connection stays open.
    #[error("Access denied")]
    AccessDenied,

    /// The named room, session, or request does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The operation is not valid in the entity's current state, e.g.
    /// accepting a non-pending request or messaging a completed session.
    #[error("{0}")]
    InvalidState(String),

    /// A persistence collaborator failed. The triggering transition is not
    /// committed; the caller should retry the whole operation.
    #[error("Dependency failure: {0}")]
    Dependency(String),
}

impl GatewayError {
    /// Creates an invalid-state error with a human-readable message.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        GatewayError::InvalidState(message.into())
    }

    /// Creates a dependency error with a human-readable message.
    pub fn dependency(message: impl Into<String>) -> Self {
        GatewayError::Dependency(message.into())
    }

    /// The message pushed to the client in the `error` event.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}
