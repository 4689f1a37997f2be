//! Notification events and audience selection.
//!
//! A [`NotificationEvent`] is transient: it exists long enough for the
//! dispatcher to persist a durable copy and push it to the connections the
//! [`Audience`] resolves to. Durable retrieval is the notification store's
//! concern, not this core's.

use serde::{Deserialize, Serialize};

use super::foundation::{Role, Timestamp, UserId};

/// Who should receive a notification.
///
/// Role audiences are resolved to the role's current membership at dispatch
/// time, never cached, so tier/role changes take effect immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    User { user_id: UserId },
    Role { role: Role },
    All,
}

impl Audience {
    pub fn user(user_id: UserId) -> Self {
        Audience::User { user_id }
    }

    pub fn role(role: Role) -> Self {
        Audience::Role { role }
    }
}

/// A domain event destined for one or more connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Machine-readable event type, e.g. "consultation_accepted".
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub audience: Audience,
    /// Optional structured payload forwarded verbatim to clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

impl NotificationEvent {
    /// Creates a notification with the given audience.
    pub fn new(
        event_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        audience: Audience,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            title: title.into(),
            message: message.into(),
            audience,
            payload: None,
            created_at: Timestamp::now(),
        }
    }

    /// Attaches a structured payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}
