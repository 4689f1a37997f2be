//! Presence & Room Registry.
//!
//! The single piece of state mutated concurrently by every connection
//! handler: who is connected, which rooms each connection has joined, and
//! which connections belong to each user. One `RwLock` guards all three
//! maps, making join/leave/broadcast linearizable per room.
//!
//! Delivery is a non-blocking send on each connection's unbounded outbound
//! channel: a slow or dead client can never stall another connection's
//! traffic. Rooms are reference counted by the maps themselves - a room
//! entry appears on first join and disappears when its last member leaves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::domain::access::can_access_room;
use crate::domain::foundation::{ConnectionId, GatewayError, Identity, UserId};
use crate::domain::room::RoomKey;
use crate::ports::RoomDirectory;

use super::messages::ServerEvent;

/// Sender half of one connection's outbound event channel.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Everything known about one live connection.
struct ConnectionEntry {
    identity: Identity,
    sender: EventSender,
    rooms: HashSet<RoomKey>,
}

/// Mutable registry state, guarded by one lock.
#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
    user_connections: HashMap<UserId, HashSet<ConnectionId>>,
}

/// Outcome of a successful room join.
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    pub key: RoomKey,
    /// Wire identifier echoed back to the client.
    pub room_id: String,
    pub room_name: String,
    /// False when the connection was already a member (idempotent re-join).
    pub newly_joined: bool,
}

/// What a disconnect released, handed to the caller exactly once.
#[derive(Debug)]
pub struct DisconnectSummary {
    pub identity: Identity,
    /// Rooms the connection belonged to at disconnect time.
    pub rooms: Vec<RoomKey>,
    /// True when this was the user's last live connection.
    pub last_user_connection: bool,
}

/// In-memory registry of live connections and room memberships.
pub struct PresenceRegistry {
    state: RwLock<RegistryState>,
    directory: Arc<dyn RoomDirectory>,
}

impl PresenceRegistry {
    pub fn new(directory: Arc<dyn RoomDirectory>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            directory,
        }
    }

    /// Registers a verified connection with an empty room set.
    pub async fn register(&self, identity: Identity, sender: EventSender) -> ConnectionId {
        let connection_id = ConnectionId::new();
        let mut state = self.state.write().await;
        state
            .user_connections
            .entry(identity.user_id.clone())
            .or_default()
            .insert(connection_id);
        state.connections.insert(
            connection_id,
            ConnectionEntry {
                identity,
                sender,
                rooms: HashSet::new(),
            },
        );
        connection_id
    }

    /// Removes a connection and all of its room memberships.
    ///
    /// Returns `Some` exactly once per connection: racing disconnect
    /// signals for the same connection see `None` after the first caller
    /// wins, so disconnect side effects run once.
    pub async fn unregister(&self, connection_id: &ConnectionId) -> Option<DisconnectSummary> {
        let mut state = self.state.write().await;
        let entry = state.connections.remove(connection_id)?;

        let rooms: Vec<RoomKey> = entry.rooms.iter().cloned().collect();
        for key in &entry.rooms {
            if let Some(members) = state.rooms.get_mut(key) {
                members.remove(connection_id);
                if members.is_empty() {
                    state.rooms.remove(key);
                }
            }
        }

        let user_id = entry.identity.user_id.clone();
        let last_user_connection = match state.user_connections.get_mut(&user_id) {
            Some(connections) => {
                connections.remove(connection_id);
                if connections.is_empty() {
                    state.user_connections.remove(&user_id);
                    true
                } else {
                    false
                }
            }
            None => true,
        };

        Some(DisconnectSummary {
            identity: entry.identity,
            rooms,
            last_user_connection,
        })
    }

    /// The identity a connection authenticated with.
    pub async fn identity_of(&self, connection_id: &ConnectionId) -> Option<Identity> {
        self.state
            .read()
            .await
            .connections
            .get(connection_id)
            .map(|entry| entry.identity.clone())
    }

    /// Resolves a client-supplied room selector to a registry key.
    ///
    /// "global" is the lobby pseudo-room and needs no lookup; anything else
    /// goes through the room directory (id, name, or slug).
    pub async fn resolve_key(&self, selector: &str) -> Result<RoomKey, GatewayError> {
        if selector.eq_ignore_ascii_case("global") {
            return Ok(RoomKey::Global);
        }
        let room = self
            .directory
            .find_room(selector)
            .await?
            .ok_or(GatewayError::NotFound("Room"))?;
        Ok(RoomKey::community(room.id))
    }

    /// Joins a connection to a community room or the lobby.
    ///
    /// Tiered rooms are resolved through the directory and gated by the
    /// access policy on every attempt. Idempotent: re-joining succeeds and
    /// does not duplicate membership.
    pub async fn join_room(
        &self,
        connection_id: &ConnectionId,
        selector: &str,
    ) -> Result<JoinedRoom, GatewayError> {
        if selector.eq_ignore_ascii_case("global") {
            let newly_joined = self.join_key(connection_id, RoomKey::Global).await?;
            return Ok(JoinedRoom {
                key: RoomKey::Global,
                room_id: "global".to_string(),
                room_name: "Global".to_string(),
                newly_joined,
            });
        }

        let room = self
            .directory
            .find_room(selector)
            .await?
            .ok_or(GatewayError::NotFound("Room"))?;

        let identity = self
            .identity_of(connection_id)
            .await
            .ok_or(GatewayError::NotFound("Connection"))?;
        if !can_access_room(&identity, room.tier) {
            return Err(GatewayError::AccessDenied);
        }

        let key = RoomKey::community(room.id);
        let newly_joined = self.join_key(connection_id, key.clone()).await?;
        Ok(JoinedRoom {
            key,
            room_id: room.id.to_string(),
            room_name: room.name,
            newly_joined,
        })
    }

    /// Adds a connection to a room by key, creating the room lazily.
    ///
    /// Returns whether the membership is new. Used directly for session
    /// rooms and the lobby, whose access checks happen upstream.
    pub async fn join_key(
        &self,
        connection_id: &ConnectionId,
        key: RoomKey,
    ) -> Result<bool, GatewayError> {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(connection_id) {
            return Err(GatewayError::NotFound("Connection"));
        }
        let newly_joined = state
            .rooms
            .entry(key.clone())
            .or_default()
            .insert(*connection_id);
        if let Some(entry) = state.connections.get_mut(connection_id) {
            entry.rooms.insert(key);
        }
        Ok(newly_joined)
    }

    /// Removes a connection from a room. Idempotent; leaving a room the
    /// connection never joined is a no-op.
    pub async fn leave_key(&self, connection_id: &ConnectionId, key: &RoomKey) {
        let mut state = self.state.write().await;
        if let Some(members) = state.rooms.get_mut(key) {
            members.remove(connection_id);
            if members.is_empty() {
                state.rooms.remove(key);
            }
        }
        if let Some(entry) = state.connections.get_mut(connection_id) {
            entry.rooms.remove(key);
        }
    }

    /// Delivers an event to every member of a room, at most once each,
    /// optionally excluding one connection (a sender avoiding its own echo).
    pub async fn broadcast(
        &self,
        key: &RoomKey,
        event: ServerEvent,
        exclude: Option<&ConnectionId>,
    ) {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(key) else {
            return;
        };
        for member in members {
            if Some(member) == exclude {
                continue;
            }
            if let Some(entry) = state.connections.get(member) {
                // Send errors mean the receiver hung up; cleanup happens in
                // the connection's own disconnect path.
                let _ = entry.sender.send(event.clone());
            }
        }
    }

    /// Delivers an event to every live connection.
    pub async fn broadcast_all(&self, event: ServerEvent, exclude: Option<&ConnectionId>) {
        let state = self.state.read().await;
        for (connection_id, entry) in &state.connections {
            if Some(connection_id) == exclude {
                continue;
            }
            let _ = entry.sender.send(event.clone());
        }
    }

    /// Delivers an event to every connection of one user (zero or more).
    ///
    /// Returns the number of connections the event was handed to.
    pub async fn send_to_user(&self, user_id: &UserId, event: ServerEvent) -> usize {
        let state = self.state.read().await;
        let Some(connections) = state.user_connections.get(user_id) else {
            return 0;
        };
        let mut delivered = 0;
        for connection_id in connections {
            if let Some(entry) = state.connections.get(connection_id) {
                if entry.sender.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Delivers an event to one connection.
    pub async fn send_to_connection(&self, connection_id: &ConnectionId, event: ServerEvent) {
        let state = self.state.read().await;
        if let Some(entry) = state.connections.get(connection_id) {
            let _ = entry.sender.send(event);
        }
    }

    /// All live connection ids for a user.
    pub async fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.state
            .read()
            .await
            .user_connections
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a connection currently belongs to a room.
    pub async fn is_member(&self, connection_id: &ConnectionId, key: &RoomKey) -> bool {
        self.state
            .read()
            .await
            .rooms
            .get(key)
            .map(|members| members.contains(connection_id))
            .unwrap_or(false)
    }

    /// Current member count of a room (0 when the room does not exist).
    pub async fn member_count(&self, key: &RoomKey) -> usize {
        self.state
            .read()
            .await
            .rooms
            .get(key)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Count of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }
}
