//! Wire protocol between the gateway and connected clients.
//!
//! Inbound traffic is parsed into typed [`ClientCommand`]s and dispatched to
//! the registry or lifecycle manager; outbound pushes are typed
//! [`ServerEvent`]s written to a per-connection channel, which preserves
//! ordering per connection. Event names match the platform's established
//! socket surface, so the tag casing is intentionally mixed.

use serde::{Deserialize, Serialize};

use crate::domain::consultation::ConsultationMessage;
use crate::domain::foundation::Timestamp;
use crate::domain::notification::NotificationEvent;

// ============================================
// Client → Server Commands
// ============================================

/// All commands a connected client can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Join a tiered community room (by id, name, or slug) or the lobby.
    #[serde(rename = "joinRoom", rename_all = "camelCase")]
    JoinRoom { room_id: String },

    /// Leave a community room or the lobby.
    #[serde(rename = "leaveRoom", rename_all = "camelCase")]
    LeaveRoom { room_id: String },

    /// Typing indicator for a community room.
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { room_id: String },

    /// Stop-typing indicator for a community room.
    #[serde(rename = "stopTyping", rename_all = "camelCase")]
    StopTyping { room_id: String },

    /// Join the ephemeral room of a consultation session.
    #[serde(rename = "joinConsultation", rename_all = "camelCase")]
    JoinConsultation { session_id: String },

    /// Leave a consultation session room.
    #[serde(rename = "leaveConsultation", rename_all = "camelCase")]
    LeaveConsultation { session_id: String },

    /// Typing indicator scoped to a consultation session.
    #[serde(rename = "consultationTyping", rename_all = "camelCase")]
    ConsultationTyping { session_id: String },

    /// Explicit presence announcement.
    #[serde(rename = "userOnline")]
    UserOnline {},
}

// ============================================
// Server → Client Events
// ============================================

/// All events the server can push to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// The caller's join succeeded.
    #[serde(rename = "room_joined", rename_all = "camelCase")]
    RoomJoined { room_id: String, room_name: String },

    /// An operation failed; the connection stays open.
    #[serde(rename = "error")]
    Error { message: String },

    /// Another member joined a room the client is in.
    #[serde(rename = "userJoined", rename_all = "camelCase")]
    UserJoined {
        user_id: String,
        user_name: String,
        room_id: String,
    },

    /// A member left a room the client is in.
    #[serde(rename = "userLeft", rename_all = "camelCase")]
    UserLeft { user_id: String, room_id: String },

    /// A member is typing.
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        room_id: String,
        user_id: String,
        user_name: String,
    },

    /// A member stopped typing.
    #[serde(rename = "stopTyping", rename_all = "camelCase")]
    StopTyping { room_id: String, user_id: String },

    /// The caller's consultation-room join succeeded.
    #[serde(rename = "consultation_room_joined", rename_all = "camelCase")]
    ConsultationRoomJoined { session_id: String },

    /// A new message in a consultation session the client has joined.
    #[serde(rename = "consultationMessage")]
    ConsultationMessage { message: ConsultationMessage },

    /// A notification addressed to this client.
    ///
    /// The category travels as `notificationType`; the `type` slot is the
    /// envelope tag.
    #[serde(rename = "notification", rename_all = "camelCase")]
    Notification {
        notification_type: String,
        title: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
        read: bool,
        created_at: Timestamp,
    },

    /// A consultation request or session changed status.
    #[serde(rename = "consultation_status_updated", rename_all = "camelCase")]
    ConsultationStatusUpdated {
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expert_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        student_id: Option<String>,
    },

    /// A user came online.
    #[serde(rename = "userOnline", rename_all = "camelCase")]
    UserOnline { user_id: String },

    /// A user went offline.
    #[serde(rename = "userOffline", rename_all = "camelCase")]
    UserOffline { user_id: String, last_seen: Timestamp },
}

impl ServerEvent {
    /// Builds the client-facing `error` event for a failed operation.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Builds the push form of a notification.
    ///
    /// `taskId` is lifted out of the payload when the producing domain event
    /// references a task; clients mark pushes unread until acknowledged
    /// against the durable store.
    pub fn notification(event: &NotificationEvent) -> Self {
        let task_id = event
            .payload
            .as_ref()
            .and_then(|p| p.get("taskId"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        ServerEvent::Notification {
            notification_type: event.event_type.clone(),
            title: event.title.clone(),
            message: event.message.clone(),
            task_id,
            read: false,
            created_at: event.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::notification::Audience;
    use serde_json::json;

    #[test]
    fn join_room_command_deserializes() {
        let json = r#"{"type": "joinRoom", "roomId": "Advanced"}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, ClientCommand::JoinRoom { room_id } if room_id == "Advanced"));
    }

    #[test]
    fn join_consultation_command_deserializes() {
        let json = r#"{"type": "joinConsultation", "sessionId": "abc-123"}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        assert!(
            matches!(cmd, ClientCommand::JoinConsultation { session_id } if session_id == "abc-123")
        );
    }

    #[test]
    fn user_online_command_deserializes_with_empty_payload() {
        let json = r#"{"type": "userOnline"}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        assert!(matches!(cmd, ClientCommand::UserOnline {}));
    }

    #[test]
    fn unknown_command_type_is_rejected() {
        let json = r#"{"type": "placeOrder", "symbol": "EURUSD"}"#;
        assert!(serde_json::from_str::<ClientCommand>(json).is_err());
    }

    #[test]
    fn room_joined_serializes_with_snake_case_tag() {
        let event = ServerEvent::RoomJoined {
            room_id: "room-1".to_string(),
            room_name: "Beginner".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"room_joined""#));
        assert!(json.contains(r#""roomId":"room-1""#));
        assert!(json.contains(r#""roomName":"Beginner""#));
    }

    #[test]
    fn user_joined_serializes_with_camel_case_tag() {
        let event = ServerEvent::UserJoined {
            user_id: "u1".to_string(),
            user_name: "Alice".to_string(),
            room_id: "room-1".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"userJoined""#));
        assert!(json.contains(r#""userName":"Alice""#));
    }

    #[test]
    fn notification_lifts_task_id_from_payload() {
        let event = NotificationEvent::new(
            "task_assigned",
            "New task",
            "Review the EURUSD analysis",
            Audience::user(UserId::new("u1").unwrap()),
        )
        .with_payload(json!({"taskId": "task-9"}));

        let push = ServerEvent::notification(&event);
        let json = serde_json::to_string(&push).unwrap();
        assert!(json.contains(r#""type":"notification""#));
        assert!(json.contains(r#""notificationType":"task_assigned""#));
        assert!(json.contains(r#""taskId":"task-9""#));
        assert!(json.contains(r#""read":false"#));
    }

    #[test]
    fn notification_category_is_distinct_from_envelope_tag() {
        let event = NotificationEvent::new(
            "consultation_requested",
            "New consultation request",
            "A student asked for a review",
            Audience::All,
        );
        let value = serde_json::to_value(ServerEvent::notification(&event)).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["notificationType"], "consultation_requested");
    }

    #[test]
    fn notification_omits_task_id_when_absent() {
        let event = NotificationEvent::new(
            "consultation_accepted",
            "Accepted",
            "Your request was accepted",
            Audience::All,
        );
        let json = serde_json::to_string(&ServerEvent::notification(&event)).unwrap();
        assert!(!json.contains("taskId"));
    }

    #[test]
    fn consultation_status_updated_omits_absent_fields() {
        let event = ServerEvent::ConsultationStatusUpdated {
            request_id: "req-1".to_string(),
            session_id: None,
            status: "rejected".to_string(),
            expert_id: Some("expert-1".to_string()),
            student_id: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"consultation_status_updated""#));
        assert!(json.contains(r#""status":"rejected""#));
        assert!(!json.contains("sessionId"));
        assert!(!json.contains("studentId"));
    }
}
