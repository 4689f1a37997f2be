//! Consultation session - the live interaction created by an accept.
//!
//! Exactly one session exists per accepted request. A session is `active`
//! from creation until the terminal `completed` transition; messages may
//! only be appended by a participant while active.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConsultationRequestId, ConsultationSessionId, GatewayError, Identity, MessageId, Timestamp,
    UserId,
};

/// Lifecycle status of a consultation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// A live consultation between one student and one expert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationSession {
    pub id: ConsultationSessionId,
    pub request_id: ConsultationRequestId,
    pub student_id: UserId,
    pub expert_id: UserId,
    pub status: SessionStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl ConsultationSession {
    /// Creates the active session for an accepted request.
    pub fn for_request(
        request_id: ConsultationRequestId,
        student_id: UserId,
        expert_id: UserId,
    ) -> Self {
        Self {
            id: ConsultationSessionId::new(),
            request_id,
            student_id,
            expert_id,
            status: SessionStatus::Active,
            started_at: Timestamp::now(),
            completed_at: None,
        }
    }

    /// True when `user_id` is the session's student or expert.
    pub fn is_participant(&self, user_id: &UserId) -> bool {
        &self.student_id == user_id || &self.expert_id == user_id
    }

    /// Checks that `caller` may append a message right now.
    ///
    /// Participants only, and only while the session is active. An
    /// instructor or admin who is not this session's expert is denied like
    /// anyone else.
    pub fn authorize_message(&self, caller: &Identity) -> Result<(), GatewayError> {
        if !self.is_participant(&caller.user_id) {
            return Err(GatewayError::AccessDenied);
        }
        if self.status != SessionStatus::Active {
            return Err(GatewayError::invalid_state(
                "Session is not active".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks that `caller` may view or join this session's room: a
    /// participant, or an admin.
    pub fn authorize_access(&self, caller: &Identity) -> Result<(), GatewayError> {
        if self.is_participant(&caller.user_id) || caller.role.is_admin() {
            Ok(())
        } else {
            Err(GatewayError::AccessDenied)
        }
    }

    /// Validates the terminal transition to `completed`.
    pub fn ensure_active(&self) -> Result<(), GatewayError> {
        if self.status == SessionStatus::Active {
            Ok(())
        } else {
            Err(GatewayError::invalid_state(
                "Session already completed".to_string(),
            ))
        }
    }
}

/// A single message appended to an active session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationMessage {
    pub id: MessageId,
    pub session_id: ConsultationSessionId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub sent_at: Timestamp,
}

impl ConsultationMessage {
    /// Creates a message from an authorized sender.
    pub fn new(
        session_id: ConsultationSessionId,
        sender: &Identity,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            sender_id: sender.user_id.clone(),
            sender_name: sender.display_name_or_email().to_string(),
            content: content.into(),
            sent_at: Timestamp::now(),
        }
    }
}
