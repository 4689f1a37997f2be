//! Realtime adapters: the WebSocket gateway, presence registry, wire
//! protocol, and notification dispatcher.

pub mod dispatcher;
pub mod gateway;
pub mod messages;
pub mod registry;

pub use dispatcher::NotificationDispatcher;
pub use gateway::{gateway_router, GatewayState};
pub use messages::{ClientCommand, ServerEvent};
pub use registry::{DisconnectSummary, EventSender, JoinedRoom, PresenceRegistry};
