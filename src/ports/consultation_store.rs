//! ConsultationStore port - request/session persistence.
//!
//! The store owns the atomicity of status transitions: `accept_request`
//! performs the pending→accepted compare-and-swap AND creates the single
//! session in one operation, so two racing accepts can never both succeed.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::consultation::{
    ConsultationMessage, ConsultationRequest, ConsultationSession, RequestStatus,
};
use crate::domain::foundation::{ConsultationRequestId, ConsultationSessionId, GatewayError};

/// Errors from consultation persistence operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Request not found")]
    RequestNotFound,

    #[error("Session not found")]
    SessionNotFound,

    /// The compare-and-swap observed a status other than `pending`.
    #[error("Request is not pending")]
    NotPending,

    /// The session has already left `active`.
    #[error("Session is not active")]
    NotActive,

    /// Backend failure. The attempted transition is not committed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RequestNotFound => GatewayError::NotFound("Request"),
            StoreError::SessionNotFound => GatewayError::NotFound("Session"),
            StoreError::NotPending => GatewayError::invalid_state("Request is not pending"),
            StoreError::NotActive => GatewayError::invalid_state("Session is not active"),
            StoreError::Unavailable(msg) => GatewayError::dependency(msg),
        }
    }
}

/// Persistence collaborator for consultation requests and sessions.
#[async_trait]
pub trait ConsultationStore: Send + Sync {
    /// Persist a new pending request.
    async fn create_request(&self, request: ConsultationRequest) -> Result<(), StoreError>;

    /// Load a request by id.
    async fn find_request(
        &self,
        id: &ConsultationRequestId,
    ) -> Result<Option<ConsultationRequest>, StoreError>;

    /// Load a session by id.
    async fn find_session(
        &self,
        id: &ConsultationSessionId,
    ) -> Result<Option<ConsultationSession>, StoreError>;

    /// Atomically transition a pending request to `accepted` and create its
    /// one active session. Fails with `NotPending` if the request already
    /// left `pending`; at most one caller ever receives the session.
    async fn accept_request(
        &self,
        id: &ConsultationRequestId,
    ) -> Result<(ConsultationRequest, ConsultationSession), StoreError>;

    /// Atomically transition a pending request to `rejected` or
    /// `cancelled`. Fails with `NotPending` if it already left `pending`.
    async fn settle_request(
        &self,
        id: &ConsultationRequestId,
        status: RequestStatus,
    ) -> Result<ConsultationRequest, StoreError>;

    /// Append a message to an active session. The write must succeed before
    /// the caller fans the message out.
    async fn append_message(&self, message: ConsultationMessage) -> Result<(), StoreError>;

    /// Atomically transition an active session to `completed` (terminal).
    async fn complete_session(
        &self,
        id: &ConsultationSessionId,
    ) -> Result<ConsultationSession, StoreError>;
}
