//! Consultation domain - request and session records.

mod request;
mod session;

pub use request::{ConsultationRequest, ConsultationType, RequestStatus};
pub use session::{ConsultationMessage, ConsultationSession, SessionStatus};
