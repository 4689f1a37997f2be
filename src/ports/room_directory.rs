//! RoomDirectory port - persisted community-room lookup.

use async_trait::async_trait;

use crate::domain::foundation::GatewayError;
use crate::domain::room::Room;

/// Resolves tiered community rooms from whatever identifier a client has.
///
/// Callers may supply the room's exact id, its human-readable name
/// ("Advanced"), or its slug ("advanced"); the directory tries all three.
/// The global lobby pseudo-room is not a directory concern: the registry
/// joins it without a lookup.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Find a room by id, name, or slug. `Ok(None)` when nothing matches.
    async fn find_room(&self, selector: &str) -> Result<Option<Room>, GatewayError>;
}
