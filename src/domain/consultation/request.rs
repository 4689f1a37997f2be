//! Consultation request - a student's ask for a one-on-one session.
//!
//! A request transitions exactly once out of `pending`: to `accepted`
//! (which atomically creates the session), `rejected`, or `cancelled`.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConsultationRequestId, GatewayError, Identity, Timestamp, UserId};

/// Lifecycle status of a consultation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Kind of consultation the student is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    StrategyReview,
    PortfolioReview,
    GeneralQuestion,
}

/// A student-initiated consultation request, prior to acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    pub id: ConsultationRequestId,
    pub student_id: UserId,
    pub expert_id: UserId,
    pub topic: String,
    pub description: String,
    pub consultation_type: ConsultationType,
    pub status: RequestStatus,
    pub created_at: Timestamp,
}

impl ConsultationRequest {
    /// Creates a new pending request.
    pub fn new(
        student_id: UserId,
        expert_id: UserId,
        topic: impl Into<String>,
        description: impl Into<String>,
        consultation_type: ConsultationType,
    ) -> Self {
        Self {
            id: ConsultationRequestId::new(),
            student_id,
            expert_id,
            topic: topic.into(),
            description: description.into(),
            consultation_type,
            status: RequestStatus::Pending,
            created_at: Timestamp::now(),
        }
    }

    /// Checks that `caller` may accept or reject this request: the assigned
    /// expert, or an admin acting on their behalf.
    pub fn authorize_decision(&self, caller: &Identity) -> Result<(), GatewayError> {
        if caller.user_id == self.expert_id || caller.role.is_admin() {
            Ok(())
        } else {
            Err(GatewayError::AccessDenied)
        }
    }

    /// Checks that `caller` may cancel this request. Cancellation is an
    /// admin-only operation.
    pub fn authorize_cancel(&self, caller: &Identity) -> Result<(), GatewayError> {
        if caller.role.is_admin() {
            Ok(())
        } else {
            Err(GatewayError::AccessDenied)
        }
    }

    /// Validates that the request can still leave `pending`.
    pub fn ensure_pending(&self) -> Result<(), GatewayError> {
        if self.status == RequestStatus::Pending {
            Ok(())
        } else {
            Err(GatewayError::invalid_state(format!(
                "Request is not pending (status: {})",
                self.status
            )))
        }
    }
}
