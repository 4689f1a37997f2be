//! Trade Academy - Real-time communication core.
//!
//! This crate implements the persistent-connection gateway for the Trade
//! Academy trading education platform: authenticated WebSocket connections,
//! tier-gated community rooms, the consultation request/session lifecycle,
//! and audience-resolved notification fan-out.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
