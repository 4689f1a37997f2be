//! HTTP adapter: REST routes, auth middleware, and error mapping.

pub mod auth;
pub mod consultations;
mod error;

pub use auth::{auth_middleware, AuthState, RequireIdentity};
pub use consultations::{consultation_router, ConsultationApiState};
pub use error::ApiError;
