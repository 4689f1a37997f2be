//! Domain layer - pure types and rules, no I/O.

pub mod access;
pub mod consultation;
pub mod foundation;
pub mod notification;
pub mod room;
