//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, enums, and error types
//! that form the vocabulary of the Trade Academy realtime core.

mod errors;
mod identity;
mod ids;
mod timestamp;

pub use errors::GatewayError;
pub use identity::{AuthError, Identity, ProficiencyTier, Role};
pub use ids::{
    ConnectionId, ConsultationRequestId, ConsultationSessionId, MessageId, RoomId, UserId,
};
pub use timestamp::Timestamp;
