//! Consultation lifecycle orchestration.
//!
//! Drives a request from creation through decision to the live session and
//! its terminal completion, wiring the store, the user directory, the
//! presence registry, and the notification dispatcher together.
//!
//! State transitions are authoritative in the store: the accept path is a
//! single store operation that flips `pending -> accepted` and creates the
//! session, so two racing accepts can never both succeed. Everything after
//! a successful transition (notifications, auto-joins, status pushes) is
//! best-effort and never rolls the transition back.

use std::sync::Arc;

use serde_json::json;

use crate::adapters::realtime::{NotificationDispatcher, PresenceRegistry, ServerEvent};
use crate::domain::consultation::{
    ConsultationMessage, ConsultationRequest, ConsultationSession, ConsultationType,
    RequestStatus,
};
use crate::domain::foundation::{
    ConsultationRequestId, ConsultationSessionId, GatewayError, Identity, Role, UserId,
};
use crate::domain::notification::{Audience, NotificationEvent};
use crate::domain::room::RoomKey;
use crate::ports::{ConsultationStore, UserDirectory};

/// Orchestrates the consultation request and session lifecycle.
pub struct ConsultationLifecycle {
    store: Arc<dyn ConsultationStore>,
    users: Arc<dyn UserDirectory>,
    registry: Arc<PresenceRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    /// Feature flag: when false, new requests are refused. Existing
    /// sessions keep working.
    consultations_enabled: bool,
}

impl ConsultationLifecycle {
    pub fn new(
        store: Arc<dyn ConsultationStore>,
        users: Arc<dyn UserDirectory>,
        registry: Arc<PresenceRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
        consultations_enabled: bool,
    ) -> Self {
        Self {
            store,
            users,
            registry,
            dispatcher,
            consultations_enabled,
        }
    }

    /// Creates a pending request from a student to an available expert.
    pub async fn create_request(
        &self,
        caller: &Identity,
        expert_id: UserId,
        topic: impl Into<String>,
        description: impl Into<String>,
        consultation_type: ConsultationType,
    ) -> Result<ConsultationRequest, GatewayError> {
        if !self.consultations_enabled {
            return Err(GatewayError::invalid_state(
                "Consultations are currently disabled".to_string(),
            ));
        }
        if caller.role != Role::Student {
            return Err(GatewayError::AccessDenied);
        }

        let expert = self
            .users
            .get_expert(&expert_id)
            .await?
            .ok_or(GatewayError::NotFound("Expert"))?;
        if !expert.available {
            return Err(GatewayError::invalid_state(
                "Expert is not accepting requests".to_string(),
            ));
        }

        let request = ConsultationRequest::new(
            caller.user_id.clone(),
            expert_id,
            topic,
            description,
            consultation_type,
        );
        self.store.create_request(request.clone()).await?;

        tracing::info!(
            request_id = %request.id,
            student_id = %request.student_id,
            expert_id = %request.expert_id,
            "Consultation request created"
        );

        self.dispatcher
            .dispatch(
                NotificationEvent::new(
                    "consultation_requested",
                    "New consultation request",
                    format!(
                        "{} requested a consultation: {}",
                        caller.display_name_or_email(),
                        request.topic
                    ),
                    Audience::user(request.expert_id.clone()),
                )
                .with_payload(json!({
                    "requestId": request.id.to_string(),
                    "studentId": request.student_id.to_string(),
                })),
            )
            .await;

        Ok(request)
    }

    /// Accepts a pending request, creating its session.
    ///
    /// The status flip and session creation happen in one store operation;
    /// a concurrent accept or reject observes `NotPending` and fails here
    /// with an invalid-state error.
    pub async fn accept(
        &self,
        caller: &Identity,
        request_id: &ConsultationRequestId,
    ) -> Result<(ConsultationRequest, ConsultationSession), GatewayError> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(GatewayError::NotFound("Request"))?;
        request.authorize_decision(caller)?;
        request.ensure_pending()?;

        let (request, session) = self.store.accept_request(request_id).await?;

        tracing::info!(
            request_id = %request.id,
            session_id = %session.id,
            "Consultation request accepted"
        );

        self.join_participants(&session).await;
        self.push_status_to_parties(
            &request,
            Some(&session),
            RequestStatus::Accepted.to_string(),
        )
        .await;

        for (user_id, message) in [
            (
                request.student_id.clone(),
                format!("Your consultation request '{}' was accepted", request.topic),
            ),
            (
                request.expert_id.clone(),
                format!("Consultation '{}' is ready to start", request.topic),
            ),
        ] {
            self.dispatcher
                .dispatch(
                    NotificationEvent::new(
                        "consultation_accepted",
                        "Consultation accepted",
                        message,
                        Audience::user(user_id),
                    )
                    .with_payload(json!({
                        "requestId": request.id.to_string(),
                        "sessionId": session.id.to_string(),
                    })),
                )
                .await;
        }

        Ok((request, session))
    }

    /// Rejects a pending request.
    pub async fn reject(
        &self,
        caller: &Identity,
        request_id: &ConsultationRequestId,
    ) -> Result<ConsultationRequest, GatewayError> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(GatewayError::NotFound("Request"))?;
        request.authorize_decision(caller)?;
        request.ensure_pending()?;

        let request = self
            .store
            .settle_request(request_id, RequestStatus::Rejected)
            .await?;

        tracing::info!(request_id = %request.id, "Consultation request rejected");

        self.push_status_to_parties(&request, None, RequestStatus::Rejected.to_string())
            .await;
        self.dispatcher
            .dispatch(
                NotificationEvent::new(
                    "consultation_rejected",
                    "Consultation declined",
                    format!("Your consultation request '{}' was declined", request.topic),
                    Audience::user(request.student_id.clone()),
                )
                .with_payload(json!({ "requestId": request.id.to_string() })),
            )
            .await;

        Ok(request)
    }

    /// Cancels a pending request. Admin-only.
    pub async fn cancel(
        &self,
        caller: &Identity,
        request_id: &ConsultationRequestId,
    ) -> Result<ConsultationRequest, GatewayError> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(GatewayError::NotFound("Request"))?;
        request.authorize_cancel(caller)?;
        request.ensure_pending()?;

        let request = self
            .store
            .settle_request(request_id, RequestStatus::Cancelled)
            .await?;

        tracing::info!(request_id = %request.id, "Consultation request cancelled");

        self.push_status_to_parties(&request, None, RequestStatus::Cancelled.to_string())
            .await;
        self.dispatcher
            .dispatch(
                NotificationEvent::new(
                    "consultation_cancelled",
                    "Consultation cancelled",
                    format!("Your consultation request '{}' was cancelled", request.topic),
                    Audience::user(request.student_id.clone()),
                )
                .with_payload(json!({ "requestId": request.id.to_string() })),
            )
            .await;

        Ok(request)
    }

    /// Appends a message to an active session and fans it out to the
    /// session room.
    ///
    /// The durable append happens before the fan-out; a message that fails
    /// to persist is never delivered.
    pub async fn send_message(
        &self,
        caller: &Identity,
        session_id: &ConsultationSessionId,
        content: impl Into<String>,
    ) -> Result<ConsultationMessage, GatewayError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(GatewayError::NotFound("Session"))?;
        session.authorize_message(caller)?;

        let message = ConsultationMessage::new(session.id, caller, content);
        self.store.append_message(message.clone()).await?;

        // The sender's connections are room members too; everyone sees the
        // same copy.
        self.registry
            .broadcast(
                &RoomKey::session(session.id),
                ServerEvent::ConsultationMessage {
                    message: message.clone(),
                },
                None,
            )
            .await;

        Ok(message)
    }

    /// Completes an active session. Participants or admins.
    pub async fn complete(
        &self,
        caller: &Identity,
        session_id: &ConsultationSessionId,
    ) -> Result<ConsultationSession, GatewayError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or(GatewayError::NotFound("Session"))?;
        session.authorize_access(caller)?;
        session.ensure_active()?;

        let session = self.store.complete_session(session_id).await?;

        tracing::info!(session_id = %session.id, "Consultation session completed");

        self.registry
            .broadcast(
                &RoomKey::session(session.id),
                ServerEvent::ConsultationStatusUpdated {
                    request_id: session.request_id.to_string(),
                    session_id: Some(session.id.to_string()),
                    status: "completed".to_string(),
                    expert_id: Some(session.expert_id.to_string()),
                    student_id: Some(session.student_id.to_string()),
                },
                None,
            )
            .await;

        for user_id in [session.student_id.clone(), session.expert_id.clone()] {
            self.dispatcher
                .dispatch(
                    NotificationEvent::new(
                        "consultation_completed",
                        "Consultation completed",
                        "Your consultation session has ended",
                        Audience::user(user_id),
                    )
                    .with_payload(json!({ "sessionId": session.id.to_string() })),
                )
                .await;
        }

        Ok(session)
    }

    /// Joins every open connection of both participants to the session
    /// room, so the accept lands them in the conversation without a
    /// round-trip.
    async fn join_participants(&self, session: &ConsultationSession) {
        let key = RoomKey::session(session.id);
        for user_id in [&session.student_id, &session.expert_id] {
            for connection_id in self.registry.connections_of(user_id).await {
                match self.registry.join_key(&connection_id, key.clone()).await {
                    Ok(_) => {
                        self.registry
                            .send_to_connection(
                                &connection_id,
                                ServerEvent::ConsultationRoomJoined {
                                    session_id: session.id.to_string(),
                                },
                            )
                            .await;
                    }
                    Err(err) => {
                        tracing::warn!(
                            connection_id = %connection_id,
                            session_id = %session.id,
                            error = %err,
                            "Auto-join to session room failed"
                        );
                    }
                }
            }
        }
    }

    /// Pushes a `consultation_status_updated` event to every connection of
    /// both parties.
    async fn push_status_to_parties(
        &self,
        request: &ConsultationRequest,
        session: Option<&ConsultationSession>,
        status: String,
    ) {
        let event = ServerEvent::ConsultationStatusUpdated {
            request_id: request.id.to_string(),
            session_id: session.map(|s| s.id.to_string()),
            status,
            expert_id: Some(request.expert_id.to_string()),
            student_id: Some(request.student_id.to_string()),
        };
        for user_id in [&request.student_id, &request.expert_id] {
            self.registry.send_to_user(user_id, event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryConsultationStore, InMemoryNotificationStore, InMemoryRoomDirectory,
        InMemoryUserDirectory,
    };
    use crate::domain::foundation::ProficiencyTier;
    use crate::ports::{ExpertProfile, NotificationStore};
    use tokio::sync::mpsc;

    fn identity(user: &str, role: Role) -> Identity {
        Identity {
            user_id: UserId::new(user).unwrap(),
            email: format!("{}@example.com", user),
            display_name: Some(user.to_string()),
            role,
            tier: if role == Role::Student {
                Some(ProficiencyTier::Beginner)
            } else {
                None
            },
        }
    }

    struct Fixture {
        registry: Arc<PresenceRegistry>,
        store: Arc<InMemoryConsultationStore>,
        notifications: Arc<InMemoryNotificationStore>,
        users: Arc<InMemoryUserDirectory>,
        lifecycle: ConsultationLifecycle,
    }

    fn fixture_with_flag(enabled: bool) -> Fixture {
        let registry = Arc::new(PresenceRegistry::new(Arc::new(InMemoryRoomDirectory::new())));
        let store = Arc::new(InMemoryConsultationStore::new());
        let notifications = Arc::new(InMemoryNotificationStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        users.add_expert(ExpertProfile {
            user_id: UserId::new("expert-1").unwrap(),
            display_name: "Eve".to_string(),
            available: true,
        });
        users.add_expert(ExpertProfile {
            user_id: UserId::new("expert-busy").unwrap(),
            display_name: "Bob".to_string(),
            available: false,
        });

        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&registry),
            notifications.clone() as Arc<dyn NotificationStore>,
            users.clone() as Arc<dyn UserDirectory>,
        ));
        let lifecycle = ConsultationLifecycle::new(
            store.clone() as Arc<dyn ConsultationStore>,
            users.clone() as Arc<dyn UserDirectory>,
            Arc::clone(&registry),
            dispatcher,
            enabled,
        );
        Fixture {
            registry,
            store,
            notifications,
            users,
            lifecycle,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_flag(true)
    }

    async fn connect(
        fixture: &Fixture,
        identity: Identity,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        fixture.registry.register(identity, tx).await;
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn create_request(f: &Fixture) -> ConsultationRequest {
        f.lifecycle
            .create_request(
                &identity("student-1", Role::Student),
                UserId::new("expert-1").unwrap(),
                "Position sizing",
                "How much risk per trade?",
                ConsultationType::StrategyReview,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn student_request_notifies_expert() {
        let f = fixture();
        let mut rx_expert = connect(&f, identity("expert-1", Role::Instructor)).await;

        let request = create_request(&f).await;
        assert_eq!(request.status, RequestStatus::Pending);

        assert_eq!(f.notifications.count_of_type("consultation_requested"), 1);
        assert!(drain(&mut rx_expert)
            .iter()
            .any(|e| matches!(e, ServerEvent::Notification { .. })));
    }

    #[tokio::test]
    async fn only_students_create_requests() {
        let f = fixture();
        let err = f
            .lifecycle
            .create_request(
                &identity("expert-2", Role::Instructor),
                UserId::new("expert-1").unwrap(),
                "t",
                "d",
                ConsultationType::GeneralQuestion,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccessDenied));
    }

    #[tokio::test]
    async fn disabled_flag_refuses_new_requests() {
        let f = fixture_with_flag(false);
        let err = f
            .lifecycle
            .create_request(
                &identity("student-1", Role::Student),
                UserId::new("expert-1").unwrap(),
                "t",
                "d",
                ConsultationType::GeneralQuestion,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
    }

    #[tokio::test]
    async fn unknown_expert_is_not_found() {
        let f = fixture();
        let err = f
            .lifecycle
            .create_request(
                &identity("student-1", Role::Student),
                UserId::new("nobody").unwrap(),
                "t",
                "d",
                ConsultationType::GeneralQuestion,
            )
            .await
            .unwrap_err();
        assert_eq!(err.client_message(), "Expert not found");
    }

    #[tokio::test]
    async fn unavailable_expert_is_refused() {
        let f = fixture();
        let err = f
            .lifecycle
            .create_request(
                &identity("student-1", Role::Student),
                UserId::new("expert-busy").unwrap(),
                "t",
                "d",
                ConsultationType::GeneralQuestion,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
    }

    #[tokio::test]
    async fn accept_creates_session_and_lands_parties_in_room() {
        let f = fixture();
        let mut rx_student = connect(&f, identity("student-1", Role::Student)).await;
        let request = create_request(&f).await;

        let expert = identity("expert-1", Role::Instructor);
        let (request, session) = f.lifecycle.accept(&expert, &request.id).await.unwrap();
        assert_eq!(request.status, RequestStatus::Accepted);

        let events = drain(&mut rx_student);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::ConsultationRoomJoined { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::ConsultationStatusUpdated { status, .. } if status == "accepted"
        )));
        assert_eq!(f.notifications.count_of_type("consultation_accepted"), 2);
        assert_eq!(f.store.session_count_for(&request.id), 1);

        let members = f
            .registry
            .member_count(&RoomKey::session(session.id))
            .await;
        assert_eq!(members, 1, "only the student is connected");
    }

    #[tokio::test]
    async fn accept_notifies_student_and_expert() {
        let f = fixture();
        let request = create_request(&f).await;

        f.lifecycle
            .accept(&identity("expert-1", Role::Instructor), &request.id)
            .await
            .unwrap();

        let audiences: Vec<_> = f
            .notifications
            .persisted()
            .into_iter()
            .filter(|e| e.event_type == "consultation_accepted")
            .map(|e| e.audience)
            .collect();
        assert!(audiences.contains(&Audience::user(UserId::new("student-1").unwrap())));
        assert!(audiences.contains(&Audience::user(UserId::new("expert-1").unwrap())));
    }

    #[tokio::test]
    async fn unassigned_instructor_cannot_accept() {
        let f = fixture();
        let request = create_request(&f).await;
        f.users.add_user(UserId::new("expert-2").unwrap(), Role::Instructor);

        let err = f
            .lifecycle
            .accept(&identity("expert-2", Role::Instructor), &request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccessDenied));
    }

    #[tokio::test]
    async fn second_accept_is_invalid_state() {
        let f = fixture();
        let request = create_request(&f).await;
        let expert = identity("expert-1", Role::Instructor);

        f.lifecycle.accept(&expert, &request.id).await.unwrap();
        let err = f.lifecycle.accept(&expert, &request.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
        assert_eq!(f.store.session_count_for(&request.id), 1);
    }

    #[tokio::test]
    async fn reject_after_accept_is_invalid_state() {
        let f = fixture();
        let request = create_request(&f).await;
        let expert = identity("expert-1", Role::Instructor);

        f.lifecycle.accept(&expert, &request.id).await.unwrap();
        let err = f.lifecycle.reject(&expert, &request.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
    }

    #[tokio::test]
    async fn reject_notifies_student() {
        let f = fixture();
        let request = create_request(&f).await;

        let rejected = f
            .lifecycle
            .reject(&identity("expert-1", Role::Instructor), &request.id)
            .await
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(f.notifications.count_of_type("consultation_rejected"), 1);
    }

    #[tokio::test]
    async fn cancel_is_admin_only_and_notifies_student() {
        let f = fixture();
        let request = create_request(&f).await;

        let err = f
            .lifecycle
            .cancel(&identity("expert-1", Role::Instructor), &request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccessDenied));

        let cancelled = f
            .lifecycle
            .cancel(&identity("admin-1", Role::Admin), &request.id)
            .await
            .unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        assert_eq!(f.notifications.count_of_type("consultation_cancelled"), 1);
    }

    #[tokio::test]
    async fn message_persists_before_fanout() {
        let f = fixture();
        let mut rx_student = connect(&f, identity("student-1", Role::Student)).await;
        let request = create_request(&f).await;
        let expert = identity("expert-1", Role::Instructor);
        let (_, session) = f.lifecycle.accept(&expert, &request.id).await.unwrap();
        drain(&mut rx_student);

        let message = f
            .lifecycle
            .send_message(&expert, &session.id, "Let's look at your last ten trades")
            .await
            .unwrap();
        assert_eq!(f.store.messages_for(&session.id).len(), 1);

        // The student's connection was auto-joined to the session room.
        assert!(drain(&mut rx_student).iter().any(|e| matches!(
            e,
            ServerEvent::ConsultationMessage { message: m } if m.id == message.id
        )));
    }

    #[tokio::test]
    async fn non_participant_admin_cannot_message() {
        let f = fixture();
        let request = create_request(&f).await;
        let (_, session) = f
            .lifecycle
            .accept(&identity("expert-1", Role::Instructor), &request.id)
            .await
            .unwrap();

        let err = f
            .lifecycle
            .send_message(&identity("admin-1", Role::Admin), &session.id, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AccessDenied));
    }

    #[tokio::test]
    async fn complete_is_terminal_and_blocks_messages() {
        let f = fixture();
        let request = create_request(&f).await;
        let expert = identity("expert-1", Role::Instructor);
        let (_, session) = f.lifecycle.accept(&expert, &request.id).await.unwrap();

        let completed = f.lifecycle.complete(&expert, &session.id).await.unwrap();
        assert!(completed.completed_at.is_some());
        assert_eq!(f.notifications.count_of_type("consultation_completed"), 2);

        let err = f.lifecycle.complete(&expert, &session.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));

        let err = f
            .lifecycle
            .send_message(&expert, &session.id, "one more thing")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
    }
}
