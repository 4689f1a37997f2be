//! Application layer - orchestration over domain and ports.

pub mod consultation;

pub use consultation::ConsultationLifecycle;
