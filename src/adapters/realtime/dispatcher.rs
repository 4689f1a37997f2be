//! Notification Dispatcher.
//!
//! Bridges domain notifications to connected clients. For every event the
//! dispatcher does two independent best-effort things:
//!
//! 1. Persist the durable copy through the `NotificationStore` port, so
//!    offline clients can poll for it later.
//! 2. Resolve the audience and push the live `notification` event through
//!    the registry.
//!
//! Neither failure blocks the other; both are logged. Role audiences are
//! resolved against the user directory at dispatch time - never cached -
//! so role changes take effect on the next dispatch.

use std::sync::Arc;

use crate::domain::notification::{Audience, NotificationEvent};
use crate::ports::{NotificationStore, UserDirectory};

use super::messages::ServerEvent;
use super::registry::PresenceRegistry;

/// Fans notifications out to the correct set of connected clients.
pub struct NotificationDispatcher {
    registry: Arc<PresenceRegistry>,
    store: Arc<dyn NotificationStore>,
    users: Arc<dyn UserDirectory>,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<PresenceRegistry>,
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            registry,
            store,
            users,
        }
    }

    /// Dispatches one event: durable write plus live push.
    ///
    /// Never fails the caller; a notification is a side channel of whatever
    /// primary operation produced it.
    pub async fn dispatch(&self, event: NotificationEvent) {
        if let Err(err) = self.store.persist(&event).await {
            tracing::warn!(
                event_type = %event.event_type,
                error = %err,
                "Durable notification write failed; live push continues"
            );
        }

        let push = ServerEvent::notification(&event);
        match &event.audience {
            Audience::User { user_id } => {
                let delivered = self.registry.send_to_user(user_id, push).await;
                tracing::debug!(
                    event_type = %event.event_type,
                    user_id = %user_id,
                    delivered,
                    "Notification pushed to user connections"
                );
            }
            Audience::Role { role } => match self.users.users_with_role(*role).await {
                Ok(members) => {
                    for user_id in members {
                        self.registry.send_to_user(&user_id, push.clone()).await;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        event_type = %event.event_type,
                        error = %err,
                        "Role audience resolution failed; live push skipped"
                    );
                }
            },
            Audience::All => {
                self.registry.broadcast_all(push, None).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryNotificationStore, InMemoryRoomDirectory, InMemoryUserDirectory,
    };
    use crate::domain::foundation::{Identity, Role, UserId};
    use tokio::sync::mpsc;

    fn identity(user: &str, role: Role) -> Identity {
        Identity {
            user_id: UserId::new(user).unwrap(),
            email: format!("{}@example.com", user),
            display_name: None,
            role,
            tier: None,
        }
    }

    struct Fixture {
        registry: Arc<PresenceRegistry>,
        store: Arc<InMemoryNotificationStore>,
        users: Arc<InMemoryUserDirectory>,
        dispatcher: NotificationDispatcher,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(PresenceRegistry::new(Arc::new(InMemoryRoomDirectory::new())));
        let store = Arc::new(InMemoryNotificationStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&registry),
            store.clone() as Arc<dyn NotificationStore>,
            users.clone() as Arc<dyn UserDirectory>,
        );
        Fixture {
            registry,
            store,
            users,
            dispatcher,
        }
    }

    async fn connect(
        fixture: &Fixture,
        identity: Identity,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        fixture.registry.register(identity, tx).await;
        rx
    }

    fn user_event(target: &str) -> NotificationEvent {
        NotificationEvent::new(
            "consultation_accepted",
            "Accepted",
            "Your consultation was accepted",
            Audience::user(UserId::new(target).unwrap()),
        )
    }

    #[tokio::test]
    async fn user_audience_reaches_only_that_user() {
        let f = fixture();
        let mut rx_target = connect(&f, identity("alice", Role::Student)).await;
        let mut rx_other = connect(&f, identity("bob", Role::Student)).await;

        f.dispatcher.dispatch(user_event("alice")).await;

        assert!(matches!(
            rx_target.try_recv(),
            Ok(ServerEvent::Notification { .. })
        ));
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn durable_copy_is_written_before_push_completes() {
        let f = fixture();
        let mut rx = connect(&f, identity("alice", Role::Student)).await;

        f.dispatcher.dispatch(user_event("alice")).await;

        assert_eq!(f.store.count_of_type("consultation_accepted"), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn store_failure_does_not_block_live_push() {
        let f = fixture();
        let mut rx = connect(&f, identity("alice", Role::Student)).await;
        f.store.set_failing(true);

        f.dispatcher.dispatch(user_event("alice")).await;

        assert!(
            matches!(rx.try_recv(), Ok(ServerEvent::Notification { .. })),
            "live push must survive a durable-write failure"
        );
    }

    #[tokio::test]
    async fn offline_user_still_gets_durable_copy() {
        let f = fixture();

        f.dispatcher.dispatch(user_event("alice")).await;

        assert_eq!(f.store.count_of_type("consultation_accepted"), 1);
    }

    #[tokio::test]
    async fn role_audience_is_resolved_at_dispatch_time() {
        let f = fixture();
        let mut rx_instructor = connect(&f, identity("eve", Role::Instructor)).await;
        let mut rx_student = connect(&f, identity("alice", Role::Student)).await;
        f.users.add_user(UserId::new("eve").unwrap(), Role::Instructor);
        f.users.add_user(UserId::new("alice").unwrap(), Role::Student);

        let event = NotificationEvent::new(
            "platform_update",
            "Heads up",
            "New lesson tools shipped",
            Audience::role(Role::Instructor),
        );
        f.dispatcher.dispatch(event).await;

        assert!(rx_instructor.try_recv().is_ok());
        assert!(rx_student.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_audience_reaches_everyone() {
        let f = fixture();
        let mut rx_a = connect(&f, identity("alice", Role::Student)).await;
        let mut rx_b = connect(&f, identity("eve", Role::Instructor)).await;

        let event = NotificationEvent::new(
            "maintenance",
            "Maintenance window",
            "Platform restarts at 02:00 UTC",
            Audience::All,
        );
        f.dispatcher.dispatch(event).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }
}
