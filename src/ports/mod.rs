//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between the
//! realtime core and the rest of the platform. Adapters implement them.
//!
//! - `TokenVerifier` - bearer-credential validation at connection time
//! - `RoomDirectory` - persisted community-room lookup (id/name/slug)
//! - `ConsultationStore` - request/session persistence with atomic
//!   status transitions
//! - `NotificationStore` - durable notification copies
//! - `UserDirectory` - expert availability and role membership resolution

mod consultation_store;
mod notification_store;
mod room_directory;
mod token_verifier;
mod user_directory;

pub use consultation_store::{ConsultationStore, StoreError};
pub use notification_store::NotificationStore;
pub use room_directory::RoomDirectory;
pub use token_verifier::TokenVerifier;
pub use user_directory::{ExpertProfile, UserDirectory};
