//! Connection registry.
//!
//! Bidirectional index between live transport connections and player
//! identities. Both directions are always updated together.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::player::PlayerId;

/// Opaque reference to a transport connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a transport-assigned connection number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Live connection index, one connection per player at most.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Connection -> player bound to it
    by_connection: HashMap<ConnectionId, PlayerId>,

    /// Player -> their live connection
    by_player: HashMap<PlayerId, ConnectionId>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `conn` to `player`, dropping any previous binding of either side.
    /// Returns the player's previous connection if it differs.
    pub fn bind(&mut self, conn: ConnectionId, player: PlayerId) -> Option<ConnectionId> {
        if let Some(previous_player) = self.by_connection.remove(&conn) {
            self.by_player.remove(&previous_player);
        }
        let previous = self.by_player.insert(player, conn);
        if let Some(old) = previous {
            self.by_connection.remove(&old);
        }
        self.by_connection.insert(conn, player);
        previous.filter(|old| *old != conn)
    }

    /// Drop the binding of `conn`, returning the player it belonged to.
    pub fn unbind_connection(&mut self, conn: ConnectionId) -> Option<PlayerId> {
        let player = self.by_connection.remove(&conn)?;
        self.by_player.remove(&player);
        Some(player)
    }

    /// Drop the binding of `player`, returning the connection it used.
    pub fn unbind_player(&mut self, player: PlayerId) -> Option<ConnectionId> {
        let conn = self.by_player.remove(&player)?;
        self.by_connection.remove(&conn);
        Some(conn)
    }

    /// Player bound to `conn`.
    pub fn player_for(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.by_connection.get(&conn).copied()
    }

    /// Live connection of `player`.
    pub fn connection_for(&self, player: PlayerId) -> Option<ConnectionId> {
        self.by_player.get(&player).copied()
    }

    /// Number of bound connections.
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    /// True when no connection is bound.
    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    /// Drop every binding.
    pub fn clear(&mut self) {
        self.by_connection.clear();
        self.by_player.clear();
    }
}
