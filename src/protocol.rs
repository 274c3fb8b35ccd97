//! Messages exchanged with the transport layer.
//!
//! Inbound `Action`s arrive tagged with the connection they came from;
//! outbound `ServerEvent`s are wrapped in `Outbound` with a recipient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::connection::ConnectionId;
use crate::state::player::{PlayerId, Role};
use crate::state::session::Phase;

/// Inbound player or host request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AuthenticateHost {
        password: String,
    },
    /// Rebind the host to a new connection with the last issued token
    ReclaimHost {
        token: String,
    },
    Join {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        player_id: Option<PlayerId>,
    },
    Leave {
        #[serde(default)]
        target: Option<PlayerId>,
    },
    StartRound,
    CastVote {
        target: PlayerId,
    },
    RevealResults,
    AdjustTime {
        delta_secs: i64,
    },
    TogglePause,
    SetRoundDuration {
        seconds: u64,
    },
    EndSession,
    RequestFullSync,
    ReturnToLobby,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticateHost { .. } => "authenticate_host",
            Self::ReclaimHost { .. } => "reclaim_host",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::StartRound => "start_round",
            Self::CastVote { .. } => "cast_vote",
            Self::RevealResults => "reveal_results",
            Self::AdjustTime { .. } => "adjust_time",
            Self::TogglePause => "toggle_pause",
            Self::SetRoundDuration { .. } => "set_round_duration",
            Self::EndSession => "end_session",
            Self::RequestFullSync => "request_full_sync",
            Self::ReturnToLobby => "return_to_lobby",
        }
    }
}

/// Roster entry as clients see it. Roles are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub score: i64,
    pub joined_at: DateTime<Utc>,

    /// When the player lost their connection, while disconnected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub id: PlayerId,
    pub name: String,
    pub score: i64,

    /// False once the player has been removed from the session
    pub present: bool,
}

/// Everything a client needs to render the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub round: u64,
    pub round_duration_secs: u64,
    pub remaining_secs: Option<u64>,
    pub paused: bool,
    pub votes_received: usize,
    pub votes_required: usize,
    pub has_host: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundResult {
    pub voted_out: Option<PlayerId>,
    pub impostor: PlayerId,
    pub correct: bool,
    pub num_correct: usize,
    pub num_possible: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    ImpostorLeft,
    NotEnoughPlayers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    HostAuthenticated {
        token: String,
    },
    IdentityAssigned {
        player_id: PlayerId,
        name: String,
        reconnect: bool,
    },
    RosterUpdated {
        players: Vec<PlayerView>,
    },
    StateUpdated(SessionSnapshot),
    RoleAssigned {
        role: Role,
        /// Present only for crew
        word: Option<String>,
    },
    RoundResult(RoundResult),
    PlayerJoined {
        player: PlayerView,
    },
    PlayerLeft {
        player_id: PlayerId,
        name: String,
    },
    PlayerKicked {
        player_id: PlayerId,
        name: String,
    },
    /// Sent to a connection whose player resumed on another connection
    ConnectionReplaced {
        player_id: PlayerId,
    },
    RoundAborted {
        reason: AbortReason,
    },
    NextRoundStarted {
        round: u64,
    },
    SessionEnded,
    /// Sent to the requester only
    ActionRejected {
        action: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    All,
    Connection(ConnectionId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outbound {
    pub to: Recipient,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn all(event: ServerEvent) -> Self {
        Self {
            to: Recipient::All,
            event,
        }
    }

    pub fn to(conn: ConnectionId, event: ServerEvent) -> Self {
        Self {
            to: Recipient::Connection(conn),
            event,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.event).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_action_wire_format() {
        let action: Action = serde_json::from_str(r#"{"type":"join","name":"Alice"}"#).unwrap();
        assert_eq!(
            action,
            Action::Join {
                name: Some("Alice".to_string()),
                player_id: None,
            }
        );

        let action: Action = serde_json::from_str(r#"{"type":"adjust_time","delta_secs":-30}"#).unwrap();
        assert_eq!(action, Action::AdjustTime { delta_secs: -30 });
        assert_eq!(action.name(), "adjust_time");
    }

    #[test]
    fn test_event_json() {
        let out = Outbound::all(ServerEvent::RoleAssigned {
            role: Role::Impostor,
            word: None,
        });
        assert_eq!(
            out.to_json(),
            serde_json::json!({"type": "role_assigned", "role": "impostor", "word": null})
        );

        let out = Outbound::all(ServerEvent::RoundAborted {
            reason: AbortReason::ImpostorLeft,
        });
        assert_eq!(
            out.to_json(),
            serde_json::json!({"type": "round_aborted", "reason": "impostor_left"})
        );
    }
}
