//! NotificationStore port - durable notification copies.

use async_trait::async_trait;

use crate::domain::foundation::GatewayError;
use crate::domain::notification::NotificationEvent;

/// Persists notifications for poll-based retrieval by offline clients.
///
/// The dispatcher treats the durable write and the live push as independent
/// best-effort operations: a failure here never blocks delivery to
/// connected clients, and vice versa.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Write the durable copy of `event`.
    async fn persist(&self, event: &NotificationEvent) -> Result<(), GatewayError>;
}
