//! Adapter implementations of the ports.
//!
//! Adapters depend on domain and ports, never the other way around.

pub mod auth;
pub mod http;
pub mod memory;
pub mod realtime;
