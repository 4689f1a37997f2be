//! Room model - broadcast groups the registry fans out to.
//!
//! Two persisted-vs-ephemeral kinds exist:
//! - *Tiered community rooms* are persisted records gated by the access
//!   policy and looked up through the `RoomDirectory` port.
//! - *Session rooms* (one per consultation session) and the global lobby
//!   exist only as registry map entries, created on first join and gone
//!   when the last member leaves.

use serde::{Deserialize, Serialize};

use super::foundation::{ConsultationSessionId, RoomId};

/// Tier of a persisted community room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl RoomTier {
    /// Numeric rank matching `ProficiencyTier::rank`.
    pub fn rank(&self) -> u8 {
        match self {
            RoomTier::Beginner => 1,
            RoomTier::Intermediate => 2,
            RoomTier::Advanced => 3,
        }
    }
}

/// A persisted tiered community room record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Human-readable name, e.g. "Advanced".
    pub name: String,
    /// URL-safe slug, e.g. "advanced".
    pub slug: String,
    pub tier: RoomTier,
}

impl Room {
    /// True when `selector` matches this room's id, name, or slug.
    ///
    /// Name matching is case-insensitive; clients send whichever form they
    /// have on hand.
    pub fn matches(&self, selector: &str) -> bool {
        self.id.to_string() == selector
            || self.name.eq_ignore_ascii_case(selector)
            || self.slug.eq_ignore_ascii_case(selector)
    }
}

/// Key identifying a live broadcast group in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomKey {
    /// The always-joinable lobby pseudo-room. Not backed by a persisted
    /// record and never gated.
    Global,
    /// A persisted tiered community room.
    Community { room_id: RoomId },
    /// Ephemeral room scoped to one consultation session.
    Session { session_id: ConsultationSessionId },
}

impl RoomKey {
    pub fn session(session_id: ConsultationSessionId) -> Self {
        RoomKey::Session { session_id }
    }

    pub fn community(room_id: RoomId) -> Self {
        RoomKey::Community { room_id }
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomKey::Global => write!(f, "global"),
            RoomKey::Community { room_id } => write!(f, "room:{}", room_id),
            RoomKey::Session { session_id } => write!(f, "consultation:{}", session_id),
        }
    }
}
