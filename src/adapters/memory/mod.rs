//! In-memory collaborator adapters.
//!
//! Deterministic implementations of the persistence-side ports, used by the
//! test suite and the default development wiring. They hold everything in
//! process memory behind `std::sync` locks.
//!
//! # Panics
//!
//! Methods may panic if internal locks are poisoned. That is acceptable for
//! test/dev adapters; production deployments plug database-backed adapters
//! into the same ports.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::domain::consultation::{
    ConsultationMessage, ConsultationRequest, ConsultationSession, RequestStatus, SessionStatus,
};
use crate::domain::foundation::{
    ConsultationRequestId, ConsultationSessionId, GatewayError, Role, Timestamp, UserId,
};
use crate::domain::notification::NotificationEvent;
use crate::domain::room::Room;
use crate::ports::{
    ConsultationStore, ExpertProfile, NotificationStore, RoomDirectory, StoreError, UserDirectory,
};

/// In-memory room directory seeded with the tiered community rooms.
#[derive(Default)]
pub struct InMemoryRoomDirectory {
    rooms: RwLock<Vec<Room>>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a room to the directory.
    pub fn add_room(&self, room: Room) {
        self.rooms
            .write()
            .expect("InMemoryRoomDirectory: rooms lock poisoned")
            .push(room);
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn find_room(&self, selector: &str) -> Result<Option<Room>, GatewayError> {
        let rooms = self
            .rooms
            .read()
            .expect("InMemoryRoomDirectory: rooms lock poisoned");
        Ok(rooms.iter().find(|room| room.matches(selector)).cloned())
    }
}

/// Everything the in-memory consultation store tracks.
#[derive(Default)]
struct ConsultationState {
    requests: HashMap<ConsultationRequestId, ConsultationRequest>,
    sessions: HashMap<ConsultationSessionId, ConsultationSession>,
    messages: Vec<ConsultationMessage>,
}

/// In-memory consultation store.
///
/// A single `Mutex` over the whole state gives the same atomicity a
/// database transaction would: `accept_request` checks the status and
/// creates the session under one critical section, so racing accepts
/// cannot both observe `pending`.
#[derive(Default)]
pub struct InMemoryConsultationStore {
    state: Mutex<ConsultationState>,
    /// When set, every operation fails with `Unavailable`. For dependency
    /// failure tests.
    fail: Mutex<bool>,
}

impl InMemoryConsultationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail (simulated outage).
    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().expect("InMemoryConsultationStore: fail lock poisoned") = failing;
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if *self.fail.lock().expect("InMemoryConsultationStore: fail lock poisoned") {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    /// All messages appended to a session, in append order (for tests).
    pub fn messages_for(&self, session_id: &ConsultationSessionId) -> Vec<ConsultationMessage> {
        self.state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned")
            .messages
            .iter()
            .filter(|m| &m.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Count of sessions referencing a request (for the at-most-one test).
    pub fn session_count_for(&self, request_id: &ConsultationRequestId) -> usize {
        self.state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned")
            .sessions
            .values()
            .filter(|s| &s.request_id == request_id)
            .count()
    }
}

#[async_trait]
impl ConsultationStore for InMemoryConsultationStore {
    async fn create_request(&self, request: ConsultationRequest) -> Result<(), StoreError> {
        self.check_available()?;
        self.state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned")
            .requests
            .insert(request.id, request);
        Ok(())
    }

    async fn find_request(
        &self,
        id: &ConsultationRequestId,
    ) -> Result<Option<ConsultationRequest>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned")
            .requests
            .get(id)
            .cloned())
    }

    async fn find_session(
        &self,
        id: &ConsultationSessionId,
    ) -> Result<Option<ConsultationSession>, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned")
            .sessions
            .get(id)
            .cloned())
    }

    async fn accept_request(
        &self,
        id: &ConsultationRequestId,
    ) -> Result<(ConsultationRequest, ConsultationSession), StoreError> {
        self.check_available()?;
        let mut state = self
            .state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned");

        let request = state.requests.get_mut(id).ok_or(StoreError::RequestNotFound)?;
        if request.status != RequestStatus::Pending {
            return Err(StoreError::NotPending);
        }
        request.status = RequestStatus::Accepted;
        let request = request.clone();

        let session = ConsultationSession::for_request(
            request.id,
            request.student_id.clone(),
            request.expert_id.clone(),
        );
        state.sessions.insert(session.id, session.clone());
        Ok((request, session))
    }

    async fn settle_request(
        &self,
        id: &ConsultationRequestId,
        status: RequestStatus,
    ) -> Result<ConsultationRequest, StoreError> {
        self.check_available()?;
        let mut state = self
            .state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned");
        let request = state.requests.get_mut(id).ok_or(StoreError::RequestNotFound)?;
        if request.status != RequestStatus::Pending {
            return Err(StoreError::NotPending);
        }
        request.status = status;
        Ok(request.clone())
    }

    async fn append_message(&self, message: ConsultationMessage) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self
            .state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned");
        let session = state
            .sessions
            .get(&message.session_id)
            .ok_or(StoreError::SessionNotFound)?;
        if session.status != SessionStatus::Active {
            return Err(StoreError::NotActive);
        }
        state.messages.push(message);
        Ok(())
    }

    async fn complete_session(
        &self,
        id: &ConsultationSessionId,
    ) -> Result<ConsultationSession, StoreError> {
        self.check_available()?;
        let mut state = self
            .state
            .lock()
            .expect("InMemoryConsultationStore: state lock poisoned");
        let session = state.sessions.get_mut(id).ok_or(StoreError::SessionNotFound)?;
        if session.status != SessionStatus::Active {
            return Err(StoreError::NotActive);
        }
        session.status = SessionStatus::Completed;
        session.completed_at = Some(Timestamp::now());
        Ok(session.clone())
    }
}

/// In-memory notification store capturing persisted events for assertions.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    persisted: RwLock<Vec<NotificationEvent>>,
    fail: RwLock<bool>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent persists fail (simulated outage).
    pub fn set_failing(&self, failing: bool) {
        *self
            .fail
            .write()
            .expect("InMemoryNotificationStore: fail lock poisoned") = failing;
    }

    /// All persisted notifications (for test assertions).
    pub fn persisted(&self) -> Vec<NotificationEvent> {
        self.persisted
            .read()
            .expect("InMemoryNotificationStore: persisted lock poisoned")
            .clone()
    }

    /// Count of persisted notifications of a type.
    pub fn count_of_type(&self, event_type: &str) -> usize {
        self.persisted()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn persist(&self, event: &NotificationEvent) -> Result<(), GatewayError> {
        if *self
            .fail
            .read()
            .expect("InMemoryNotificationStore: fail lock poisoned")
        {
            return Err(GatewayError::dependency("notification store unavailable"));
        }
        self.persisted
            .write()
            .expect("InMemoryNotificationStore: persisted lock poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// In-memory user directory with registered experts and role membership.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    experts: RwLock<HashMap<UserId, ExpertProfile>>,
    roles: RwLock<HashMap<UserId, Role>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with a role.
    pub fn add_user(&self, user_id: UserId, role: Role) {
        self.roles
            .write()
            .expect("InMemoryUserDirectory: roles lock poisoned")
            .insert(user_id, role);
    }

    /// Registers an expert profile (and the instructor role).
    pub fn add_expert(&self, profile: ExpertProfile) {
        self.add_user(profile.user_id.clone(), Role::Instructor);
        self.experts
            .write()
            .expect("InMemoryUserDirectory: experts lock poisoned")
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_expert(&self, user_id: &UserId) -> Result<Option<ExpertProfile>, GatewayError> {
        Ok(self
            .experts
            .read()
            .expect("InMemoryUserDirectory: experts lock poisoned")
            .get(user_id)
            .cloned())
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<UserId>, GatewayError> {
        Ok(self
            .roles
            .read()
            .expect("InMemoryUserDirectory: roles lock poisoned")
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consultation::ConsultationType;
    use crate::domain::foundation::{Identity, ProficiencyTier};
    use crate::domain::foundation::RoomId;
    use crate::domain::room::RoomTier;

    fn pending_request() -> ConsultationRequest {
        ConsultationRequest::new(
            UserId::new("student-1").unwrap(),
            UserId::new("expert-1").unwrap(),
            "Chart reading",
            "Walk me through this setup",
            ConsultationType::StrategyReview,
        )
    }

    #[tokio::test]
    async fn directory_finds_room_by_any_selector() {
        let directory = InMemoryRoomDirectory::new();
        let id = RoomId::new();
        directory.add_room(Room {
            id,
            name: "Intermediate".to_string(),
            slug: "intermediate".to_string(),
            tier: RoomTier::Intermediate,
        });

        assert!(directory.find_room("Intermediate").await.unwrap().is_some());
        assert!(directory.find_room("intermediate").await.unwrap().is_some());
        assert!(directory.find_room(&id.to_string()).await.unwrap().is_some());
        assert!(directory.find_room("Advanced").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accept_creates_exactly_one_session() {
        let store = InMemoryConsultationStore::new();
        let request = pending_request();
        let request_id = request.id;
        store.create_request(request).await.unwrap();

        let (accepted, session) = store.accept_request(&request_id).await.unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert_eq!(session.request_id, request_id);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(store.session_count_for(&request_id), 1);
    }

    #[tokio::test]
    async fn second_accept_observes_not_pending() {
        let store = InMemoryConsultationStore::new();
        let request = pending_request();
        let request_id = request.id;
        store.create_request(request).await.unwrap();

        store.accept_request(&request_id).await.unwrap();
        let err = store.accept_request(&request_id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotPending));
        assert_eq!(store.session_count_for(&request_id), 1);
    }

    #[tokio::test]
    async fn concurrent_accepts_yield_one_session() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryConsultationStore::new());
        let request = pending_request();
        let request_id = request.id;
        store.create_request(request).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.accept_request(&request_id).await },
            ));
        }

        let mut successes = 0;
        let mut not_pending = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(StoreError::NotPending) => not_pending += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(not_pending, 7);
        assert_eq!(store.session_count_for(&request_id), 1);
    }

    #[tokio::test]
    async fn settle_rejects_non_pending_request() {
        let store = InMemoryConsultationStore::new();
        let request = pending_request();
        let request_id = request.id;
        store.create_request(request).await.unwrap();
        store
            .settle_request(&request_id, RequestStatus::Rejected)
            .await
            .unwrap();

        let err = store
            .settle_request(&request_id, RequestStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotPending));
    }

    #[tokio::test]
    async fn append_message_requires_active_session() {
        let store = InMemoryConsultationStore::new();
        let request = pending_request();
        let request_id = request.id;
        store.create_request(request).await.unwrap();
        let (_, session) = store.accept_request(&request_id).await.unwrap();

        let sender = Identity {
            user_id: UserId::new("student-1").unwrap(),
            email: "student-1@example.com".to_string(),
            display_name: None,
            role: Role::Student,
            tier: Some(ProficiencyTier::Beginner),
        };
        let message = ConsultationMessage::new(session.id, &sender, "hello");
        store.append_message(message.clone()).await.unwrap();
        assert_eq!(store.messages_for(&session.id).len(), 1);

        store.complete_session(&session.id).await.unwrap();
        let err = store.append_message(message).await.unwrap_err();
        assert!(matches!(err, StoreError::NotActive));
    }

    #[tokio::test]
    async fn complete_is_terminal() {
        let store = InMemoryConsultationStore::new();
        let request = pending_request();
        let request_id = request.id;
        store.create_request(request).await.unwrap();
        let (_, session) = store.accept_request(&request_id).await.unwrap();

        let completed = store.complete_session(&session.id).await.unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);
        assert!(completed.completed_at.is_some());

        let err = store.complete_session(&session.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotActive));
    }

    #[tokio::test]
    async fn failing_store_reports_unavailable() {
        let store = InMemoryConsultationStore::new();
        store.set_failing(true);
        let err = store.create_request(pending_request()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn user_directory_resolves_role_membership() {
        let directory = InMemoryUserDirectory::new();
        directory.add_user(UserId::new("s1").unwrap(), Role::Student);
        directory.add_expert(ExpertProfile {
            user_id: UserId::new("e1").unwrap(),
            display_name: "Eve".to_string(),
            available: true,
        });
        directory.add_expert(ExpertProfile {
            user_id: UserId::new("e2").unwrap(),
            display_name: "Ed".to_string(),
            available: false,
        });

        let instructors = directory.users_with_role(Role::Instructor).await.unwrap();
        assert_eq!(instructors.len(), 2);

        let expert = directory
            .get_expert(&UserId::new("e1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(expert.available);
        assert!(directory
            .get_expert(&UserId::new("s1").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn notification_store_captures_events() {
        use crate::domain::notification::Audience;

        let store = InMemoryNotificationStore::new();
        let event = NotificationEvent::new(
            "consultation_requested",
            "New request",
            "A student asked for help",
            Audience::user(UserId::new("e1").unwrap()),
        );
        store.persist(&event).await.unwrap();
        assert_eq!(store.count_of_type("consultation_requested"), 1);

        store.set_failing(true);
        assert!(store.persist(&event).await.is_err());
    }
}
