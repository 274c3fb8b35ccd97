//! Player roster.
//!
//! The roster is the only owner of `Player` records. Identities are stable for
//! the lifetime of the session: a player keeps id, name and score across any
//! number of disconnects.
//!
//! # Connection states
//!
//! ```text
//!                 join (new)
//!                     │
//!                     ▼
//!              ┌─────────────┐   transport loss / self-leave   ┌──────────────┐
//!              │  Connected  │────────────────────────────────▶│ Disconnected │
//!              │ (conn ref)  │◀────────────────────────────────│   (since)    │
//!              └──────┬──────┘   join (prior id or by name)    └──────┬───────┘
//!                     │                                               │
//!                     │ kick / leave-confirmation / session reset     │
//!                     ▼                                               │
//!              ┌─────────────┐                                        │
//!              │   Removed   │◀───────────────────────────────────────┘
//!              │ (departed)  │
//!              └─────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Rejection;
use crate::protocol::{LeaderboardEntry, PlayerView};
use crate::state::connection::ConnectionId;

/// Stable player identity, generated once on first join.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing identity.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a player currently has a live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected(ConnectionId),
    Disconnected { since: DateTime<Utc> },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Live connection, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            Self::Connected(conn) => Some(*conn),
            Self::Disconnected { .. } => None,
        }
    }
}

/// Role for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    #[serde(rename = "none")]
    Unassigned,
    Crew,
    Impostor,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,

    /// Unique among connected players
    pub name: String,

    pub connection: ConnectionState,

    pub role: Role,

    /// Cumulative across rounds
    pub score: i64,

    pub joined_at: DateTime<Utc>,
}

impl Player {
    fn new(name: String, conn: ConnectionId) -> Self {
        Self {
            id: PlayerId::new(),
            name,
            connection: ConnectionState::Connected(conn),
            role: Role::Unassigned,
            score: 0,
            joined_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Public view, roles excluded.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            connected: self.is_connected(),
            score: self.score,
            joined_at: self.joined_at,
            disconnected_since: match self.connection {
                ConnectionState::Connected(_) => None,
                ConnectionState::Disconnected { since } => Some(since),
            },
        }
    }
}

/// Final name and score of a hard-removed player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartedPlayer {
    pub name: String,
    pub score: i64,
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub id: PlayerId,

    /// True when an existing identity was resumed
    pub reconnect: bool,
}

#[derive(Debug, Default)]
pub struct PlayerRoster {
    /// Ordered by identity, which keeps iteration deterministic
    players: BTreeMap<PlayerId, Player>,

    /// Hard-removed players still shown on the leaderboard
    departed: BTreeMap<PlayerId, DepartedPlayer>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join or rejoin.
    ///
    /// A known `prior` identity reconnects, provided the name it ends up with
    /// is not held by another connected player. Otherwise a name matching
    /// exactly one disconnected player reconnects that player, and any other
    /// name creates a new player if no connected player holds it.
    pub fn join(
        &mut self,
        name: Option<&str>,
        prior: Option<PlayerId>,
        conn: ConnectionId,
    ) -> Result<Joined, Rejection> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        if let Some(id) = prior.filter(|id| self.players.contains_key(id)) {
            return self.reconnect(id, name, conn);
        }

        let name = name.ok_or(Rejection::EmptyName)?;
        if self.find_connected_by_name(name).is_some() {
            return Err(Rejection::NameTaken(name.to_string()));
        }

        if prior.is_none() {
            if let Some(id) = self.find_disconnected_by_name(name) {
                return self.reconnect(id, None, conn);
            }
        }

        let player = Player::new(name.to_string(), conn);
        let id = player.id;
        self.players.insert(id, player);
        Ok(Joined {
            id,
            reconnect: false,
        })
    }

    fn reconnect(
        &mut self,
        id: PlayerId,
        name: Option<&str>,
        conn: ConnectionId,
    ) -> Result<Joined, Rejection> {
        match name {
            Some(name) => self.rename(id, name)?,
            None => {
                // The kept name may have been claimed while this player was away.
                let kept = self.get(id).ok_or(Rejection::UnknownPlayer)?.name.clone();
                if self
                    .find_connected_by_name(&kept)
                    .is_some_and(|holder| holder != id)
                {
                    return Err(Rejection::NameTaken(kept));
                }
            }
        }
        self.mark_connected(id, conn);
        Ok(Joined {
            id,
            reconnect: true,
        })
    }

    /// Bind a player to a live connection.
    pub fn mark_connected(&mut self, id: PlayerId, conn: ConnectionId) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.connection = ConnectionState::Connected(conn);
                true
            }
            None => false,
        }
    }

    /// Soft removal. Returns false if the player was unknown or already
    /// disconnected.
    pub fn mark_disconnected(&mut self, id: PlayerId) -> bool {
        match self.players.get_mut(&id) {
            Some(player) if player.is_connected() => {
                player.connection = ConnectionState::Disconnected { since: Utc::now() };
                true
            }
            _ => false,
        }
    }

    /// Hard removal. The player's final score stays on the leaderboard.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        self.departed.insert(
            id,
            DepartedPlayer {
                name: player.name.clone(),
                score: player.score,
            },
        );
        Some(player)
    }

    pub fn rename(&mut self, id: PlayerId, new_name: &str) -> Result<(), Rejection> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Rejection::EmptyName);
        }
        if let Some(holder) = self.find_connected_by_name(new_name) {
            if holder != id {
                return Err(Rejection::NameTaken(new_name.to_string()));
            }
        }
        let player = self.players.get_mut(&id).ok_or(Rejection::UnknownPlayer)?;
        player.name = new_name.to_string();
        Ok(())
    }

    /// Player by identity.
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Mutable player by identity.
    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// True while `id` is on the roster (connected or not).
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// True when `id` is on the roster and has a live connection.
    pub fn is_connected(&self, id: PlayerId) -> bool {
        self.players.get(&id).is_some_and(Player::is_connected)
    }

    /// Connected player holding `name`.
    pub fn find_connected_by_name(&self, name: &str) -> Option<PlayerId> {
        self.players
            .values()
            .find(|p| p.is_connected() && p.name == name)
            .map(|p| p.id)
    }

    /// Only an unambiguous match counts.
    pub fn find_disconnected_by_name(&self, name: &str) -> Option<PlayerId> {
        let mut matches = self
            .players
            .values()
            .filter(|p| !p.is_connected() && p.name == name);
        match (matches.next(), matches.next()) {
            (Some(p), None) => Some(p.id),
            _ => None,
        }
    }

    /// All players in identity order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Connected player ids in identity order.
    pub fn connected_ids(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_connected())
            .map(|p| p.id)
            .collect()
    }

    /// Number of connected players.
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected()).count()
    }

    /// Number of players on the roster.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Reset every player's role to unassigned.
    pub fn clear_roles(&mut self) {
        for player in self.players.values_mut() {
            player.role = Role::Unassigned;
        }
    }

    /// Add `points` to a present player's score.
    pub fn add_score(&mut self, id: PlayerId, points: i64) {
        if let Some(player) = self.players.get_mut(&id) {
            player.score += points;
        }
    }

    /// Current and departed players, score descending. Names of present
    /// players are resolved at call time.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .players
            .values()
            .map(|p| LeaderboardEntry {
                id: p.id,
                name: p.name.clone(),
                score: p.score,
                present: true,
            })
            .chain(self.departed.iter().map(|(id, d)| LeaderboardEntry {
                id: *id,
                name: d.name.clone(),
                score: d.score,
                present: false,
            }))
            .collect();
        entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        entries
    }

    /// Forget everyone, including departed scores.
    pub fn clear(&mut self) {
        self.players.clear();
        self.departed.clear();
    }

    /// Public roster for clients.
    pub fn views(&self) -> Vec<PlayerView> {
        self.players.values().map(Player::view).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    #[test]
    fn test_join_new_player() {
        let mut roster = PlayerRoster::new();
        let joined = roster.join(Some("Alice"), None, conn(1)).unwrap();

        assert!(!joined.reconnect);
        let player = roster.get(joined.id).unwrap();
        assert_eq!(player.name, "Alice");
        assert_eq!(player.score, 0);
        assert_eq!(player.role, Role::Unassigned);
        assert!(player.is_connected());
    }

    #[test]
    fn test_join_rejects_empty_and_duplicate_names() {
        let mut roster = PlayerRoster::new();
        roster.join(Some("Alice"), None, conn(1)).unwrap();

        assert_eq!(roster.join(Some("   "), None, conn(2)), Err(Rejection::EmptyName));
        assert_eq!(roster.join(None, None, conn(2)), Err(Rejection::EmptyName));
        assert_eq!(
            roster.join(Some("Alice"), None, conn(2)),
            Err(Rejection::NameTaken("Alice".to_string()))
        );
    }

    #[test]
    fn test_reconnect_by_identity_preserves_score() {
        let mut roster = PlayerRoster::new();
        let id = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        roster.add_score(id, 4);
        assert!(roster.mark_disconnected(id));
        assert!(!roster.mark_disconnected(id));

        let joined = roster.join(None, Some(id), conn(7)).unwrap();
        assert!(joined.reconnect);
        assert_eq!(joined.id, id);
        let player = roster.get(id).unwrap();
        assert_eq!(player.score, 4);
        assert_eq!(player.name, "Alice");
        assert_eq!(player.connection, ConnectionState::Connected(conn(7)));
    }

    #[test]
    fn test_reconnect_from_second_connection() {
        let mut roster = PlayerRoster::new();
        let id = roster.join(Some("Alice"), None, conn(1)).unwrap().id;

        let joined = roster.join(None, Some(id), conn(2)).unwrap();
        assert_eq!(joined.id, id);
        assert_eq!(roster.get(id).unwrap().connection.connection(), Some(conn(2)));
    }

    #[test]
    fn test_reconnect_refuses_name_claimed_while_away() {
        let mut roster = PlayerRoster::new();
        let original = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        roster.mark_disconnected(original);

        // A stranger takes the free name
        let stranger = roster
            .join(Some("Alice"), Some(PlayerId::new()), conn(2))
            .unwrap()
            .id;
        assert_ne!(stranger, original);

        assert_eq!(
            roster.join(None, Some(original), conn(3)),
            Err(Rejection::NameTaken("Alice".to_string()))
        );
        assert!(!roster.is_connected(original));

        // A fresh name gets back in
        let joined = roster.join(Some("Alice2"), Some(original), conn(3)).unwrap();
        assert!(joined.reconnect);
        let alices = roster
            .players()
            .filter(|p| p.is_connected() && p.name == "Alice")
            .count();
        assert_eq!(alices, 1);
    }

    #[test]
    fn test_reconnect_with_new_name_renames() {
        let mut roster = PlayerRoster::new();
        let id = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        roster.join(Some("Bob"), None, conn(2)).unwrap();
        roster.mark_disconnected(id);

        roster.join(Some("Alicia"), Some(id), conn(3)).unwrap();
        assert_eq!(roster.get(id).unwrap().name, "Alicia");

        // A taken name refuses the reconnect
        roster.mark_disconnected(id);
        assert_eq!(
            roster.join(Some("Bob"), Some(id), conn(4)),
            Err(Rejection::NameTaken("Bob".to_string()))
        );
        assert_eq!(roster.get(id).unwrap().name, "Alicia");
        assert!(!roster.is_connected(id));
    }

    #[test]
    fn test_view_reports_disconnect_time() {
        let mut roster = PlayerRoster::new();
        let id = roster.join(Some("Alice"), None, conn(1)).unwrap().id;

        let view = roster.get(id).unwrap().view();
        assert!(view.connected);
        assert_eq!(view.disconnected_since, None);

        roster.mark_disconnected(id);
        let view = roster.get(id).unwrap().view();
        assert!(!view.connected);
        assert!(view.disconnected_since.unwrap() >= view.joined_at);
    }

    #[test]
    fn test_disconnected_name_reconnects_by_name() {
        let mut roster = PlayerRoster::new();
        let id = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        roster.mark_disconnected(id);

        let joined = roster.join(Some("Alice"), None, conn(2)).unwrap();
        assert!(joined.reconnect);
        assert_eq!(joined.id, id);
    }

    #[test]
    fn test_unknown_prior_identity_does_not_claim_disconnected_name() {
        let mut roster = PlayerRoster::new();
        let id = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        roster.mark_disconnected(id);

        let joined = roster
            .join(Some("Alice"), Some(PlayerId::new()), conn(2))
            .unwrap();
        assert!(!joined.reconnect);
        assert_ne!(joined.id, id);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_remove_keeps_leaderboard_entry() {
        let mut roster = PlayerRoster::new();
        let a = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        let b = roster.join(Some("Bob"), None, conn(2)).unwrap().id;
        roster.add_score(a, 1);
        roster.add_score(b, 3);

        let removed = roster.remove(b).unwrap();
        assert_eq!(removed.name, "Bob");
        assert!(!roster.contains(b));

        let board = roster.leaderboard();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].name, "Bob");
        assert!(!board[0].present);
        assert_eq!(board[1].name, "Alice");
        assert!(board[1].present);
    }

    #[test]
    fn test_rename() {
        let mut roster = PlayerRoster::new();
        let a = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        roster.join(Some("Bob"), None, conn(2)).unwrap();

        assert_eq!(
            roster.rename(a, "Bob"),
            Err(Rejection::NameTaken("Bob".to_string()))
        );
        assert_eq!(roster.rename(a, ""), Err(Rejection::EmptyName));
        roster.rename(a, "Ally").unwrap();
        assert_eq!(roster.get(a).unwrap().name, "Ally");
    }

    #[test]
    fn test_connected_count() {
        let mut roster = PlayerRoster::new();
        let a = roster.join(Some("Alice"), None, conn(1)).unwrap().id;
        roster.join(Some("Bob"), None, conn(2)).unwrap();
        assert_eq!(roster.connected_count(), 2);

        roster.mark_disconnected(a);
        assert_eq!(roster.connected_count(), 1);
        assert_eq!(roster.len(), 2);
    }
}
