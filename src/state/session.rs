//! Session state machine.
//!
//! `Session` owns every piece of session state and is the only place it is
//! mutated. Each entry point validates its guards, applies one transition,
//! and returns an `Outcome` listing the messages to deliver and the grace
//! checks to schedule. It never blocks and never spawns; the runtime does.
//!
//! # Phases
//!
//! ```text
//!              host login                 start_round
//!  ┌─────────┐ ─────────▶ ┌─────────┐ ───────────────────▶ ┌─────────┐
//!  │ Waiting │            │  Lobby  │                       │  Game   │
//!  └─────────┘ ◀───────── └─────────┘ ◀── impostor left ─── └────┬────┘
//!       ▲       end_session    ▲  ▲       / below minimum        │ timer hits zero
//!       │                      │  │                              ▼
//!       │                      │  │   below minimum         ┌─────────┐
//!       │                      │  └─────────────────────────│ Voting  │
//!       │                      │                            └────┬────┘
//!       │                      │ below minimum /                 │ reveal
//!       │                      │ return_to_lobby                 ▼
//!       │                      │                           ┌─────────────┐
//!       └──────────────────────┴───────────────────────────│ Leaderboard │
//!                       end_session                        └──────┬──────┘
//!                                                 start_round     │
//!                                                 (next round) ───┘──▶ Game
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::auth::{issue_host_token, HostVerifier};
use crate::config::{clamp_round_duration, SessionConfig, MAX_ROUND_DURATION};
use crate::error::Rejection;
use crate::protocol::{
    AbortReason, Action, LeaderboardEntry, Outbound, RoundResult, ServerEvent, SessionSnapshot,
};
use crate::state::connection::{ConnectionId, ConnectionRegistry};
use crate::state::grace::{DisconnectGraceMonitor, GraceCheck, GraceVerdict};
use crate::state::player::{PlayerId, PlayerRoster, Role};
use crate::state::timer::RoundTimer;
use crate::state::votes::{score_round, VoteBoard};
use crate::state::words::WordPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No host yet; joins are refused
    #[default]
    Waiting,
    Lobby,
    Game,
    Voting,
    Leaderboard,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Lobby => "lobby",
            Self::Game => "game",
            Self::Voting => "voting",
            Self::Leaderboard => "leaderboard",
        }
    }

    /// Phases that require the minimum number of connected players.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Game | Self::Voting | Self::Leaderboard)
    }
}

/// Messages to deliver and background checks to schedule.
#[derive(Debug, Default)]
pub struct Outcome {
    pub messages: Vec<Outbound>,
    pub grace_checks: Vec<GraceCheck>,
}

impl Outcome {
    fn push(&mut self, message: Outbound) {
        self.messages.push(message);
    }

    fn extend(&mut self, other: Outcome) {
        self.messages.extend(other.messages);
        self.grace_checks.extend(other.grace_checks);
    }
}

#[derive(Debug)]
struct HostBinding {
    /// None while the host's transport is down
    connection: Option<ConnectionId>,

    /// Single-use capability for `reclaim_host`
    token: String,
}

#[derive(Debug)]
struct RoundState {
    word: String,
    impostor: PlayerId,

    /// Players assigned a role at round start; only they learn the word
    dealt: BTreeSet<PlayerId>,

    /// Carries the round id
    timer: RoundTimer,
}

/// The whole session: roster, host, round and phase.
pub struct Session {
    config: SessionConfig,
    verifier: Box<dyn HostVerifier>,
    phase: Phase,
    host: Option<HostBinding>,
    roster: PlayerRoster,
    connections: ConnectionRegistry,
    votes: VoteBoard,
    words: WordPool,
    grace: DisconnectGraceMonitor,
    round: Option<RoundState>,

    /// Generation counter; never reset so stale ticks stay stale
    rounds_started: u64,

    round_duration: Duration,
    leaderboard: Option<Vec<LeaderboardEntry>>,
    last_result: Option<RoundResult>,
    rng: StdRng,
}

impl Session {
    /// Create a session in `Waiting`. `config` is normalized first.
    pub fn new(config: SessionConfig, words: WordPool, verifier: Box<dyn HostVerifier>) -> Self {
        let config = config.normalized();
        Self {
            grace: DisconnectGraceMonitor::new(config.grace_period),
            round_duration: config.round_duration,
            config,
            verifier,
            phase: Phase::Waiting,
            host: None,
            roster: PlayerRoster::new(),
            connections: ConnectionRegistry::new(),
            votes: VoteBoard::new(),
            words,
            round: None,
            rounds_started: 0,
            leaderboard: None,
            last_result: None,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Fix the impostor draw (for deterministic tests).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    // Read access

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every player still on the roster, connected or not.
    pub fn roster(&self) -> &PlayerRoster {
        &self.roster
    }

    /// Votes cast this round.
    pub fn votes(&self) -> &VoteBoard {
        &self.votes
    }

    /// Player bound to `conn`.
    pub fn player_for(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.connections.player_for(conn)
    }

    /// The host's live connection. None while no host is bound or the
    /// host's transport is down.
    pub fn host_connection(&self) -> Option<ConnectionId> {
        self.host.as_ref().and_then(|h| h.connection)
    }

    /// Impostor of the current round.
    pub fn impostor(&self) -> Option<PlayerId> {
        self.round.as_ref().map(|r| r.impostor)
    }

    /// Word of the current round.
    pub fn secret_word(&self) -> Option<&str> {
        self.round.as_ref().map(|r| r.word.as_str())
    }

    /// Duration applied to the next round started.
    pub fn round_duration(&self) -> Duration {
        self.round_duration
    }

    /// Round id whose ticker should be running, if any.
    pub fn active_ticker(&self) -> Option<u64> {
        match (&self.round, self.phase) {
            (Some(round), Phase::Game) => Some(round.timer.round_id()),
            _ => None,
        }
    }

    /// Client-facing view of the session right now.
    pub fn snapshot(&self) -> SessionSnapshot {
        let now = Instant::now();
        let timer = self
            .round
            .as_ref()
            .filter(|_| self.phase == Phase::Game)
            .map(|r| &r.timer);
        SessionSnapshot {
            phase: self.phase,
            round: self.rounds_started,
            round_duration_secs: self.round_duration.as_secs(),
            remaining_secs: timer.map(|t| ceil_secs(t.remaining(now))),
            paused: timer.is_some_and(|t| t.is_paused()),
            votes_received: self.votes.received(),
            votes_required: self.roster.connected_count(),
            has_host: self.host.is_some(),
            leaderboard: self
                .leaderboard
                .clone()
                .filter(|_| self.phase == Phase::Leaderboard),
        }
    }

    // Entry points

    /// Apply an inbound action from `conn`.
    pub fn handle(&mut self, conn: ConnectionId, action: Action) -> Outcome {
        let action_name = action.name();
        let result = match action {
            Action::AuthenticateHost { password } => self.authenticate_host(conn, &password),
            Action::ReclaimHost { token } => self.reclaim_host(conn, &token),
            Action::Join { name, player_id } => self.join(conn, name.as_deref(), player_id),
            Action::Leave { target } => self.leave(conn, target),
            Action::StartRound => self.start_round(conn),
            Action::CastVote { target } => self.cast_vote(conn, target),
            Action::RevealResults => self.reveal(conn),
            Action::AdjustTime { delta_secs } => self.adjust_time(conn, delta_secs),
            Action::TogglePause => self.toggle_pause(conn),
            Action::SetRoundDuration { seconds } => self.set_round_duration(conn, seconds),
            Action::EndSession => self.end_session(conn),
            Action::RequestFullSync => Ok(self.full_sync(conn)),
            Action::ReturnToLobby => self.return_to_lobby(conn),
        };

        match result {
            Ok(outcome) => outcome,
            Err(rejection) if rejection.is_silent() => {
                debug!(%conn, action = action_name, reason = %rejection, "dropped action");
                Outcome::default()
            }
            Err(rejection) => {
                debug!(%conn, action = action_name, reason = %rejection, "rejected action");
                let mut outcome = Outcome::default();
                outcome.push(Outbound::to(
                    conn,
                    ServerEvent::ActionRejected {
                        action: action_name.to_string(),
                        reason: rejection.to_string(),
                    },
                ));
                outcome
            }
        }
    }

    /// Transport lost `conn`.
    pub fn disconnected(&mut self, conn: ConnectionId) -> Outcome {
        let mut outcome = Outcome::default();

        if let Some(host) = self.host.as_mut().filter(|h| h.connection == Some(conn)) {
            host.connection = None;
            info!(%conn, "host connection lost");
        }

        let Some(player) = self.connections.unbind_connection(conn) else {
            return outcome;
        };
        if self.roster.mark_disconnected(player) {
            info!(%player, phase = self.phase.as_str(), "player disconnected");
            outcome
                .grace_checks
                .push(self.grace.on_disconnect(player, Instant::now()));
            outcome.push(self.roster_update());
            outcome.push(self.state_update());
        }
        outcome
    }

    /// Periodic timer tick for `round_id`.
    pub fn tick(&mut self, round_id: u64) -> Outcome {
        if self.active_ticker() != Some(round_id) {
            return Outcome::default();
        }
        self.check_expiry()
    }

    /// A grace window scheduled for `player` has elapsed.
    pub fn grace_expired(&mut self, player: PlayerId, event_id: u64) -> Outcome {
        let mut outcome = Outcome::default();
        match self.grace.fire(player, event_id, Instant::now()) {
            GraceVerdict::Stale => {}
            GraceVerdict::Deferred(check) => {
                debug!(%player, "grace check deferred, another window is open");
                outcome.grace_checks.push(check);
            }
            GraceVerdict::Expired => {
                let connected = self.roster.connected_count();
                if !self.roster.is_connected(player)
                    && self.phase.is_active()
                    && connected < self.config.min_players
                {
                    info!(
                        %player,
                        connected,
                        required = self.config.min_players,
                        "grace window elapsed below minimum, reverting to lobby"
                    );
                    outcome.extend(self.abort_round(AbortReason::NotEnoughPlayers));
                }
            }
        }
        outcome
    }

    // Host

    fn is_host(&self, conn: ConnectionId) -> bool {
        self.host_connection() == Some(conn)
    }

    fn require_host(&self, conn: ConnectionId) -> Result<(), Rejection> {
        if self.is_host(conn) {
            Ok(())
        } else {
            Err(Rejection::Unauthorized)
        }
    }

    fn authenticate_host(&mut self, conn: ConnectionId, password: &str) -> Result<Outcome, Rejection> {
        if self.host.is_some() {
            return Err(Rejection::DuplicateHost);
        }
        if !self.verifier.verify(password) {
            return Err(Rejection::BadCredentials);
        }

        let token = issue_host_token();
        self.host = Some(HostBinding {
            connection: Some(conn),
            token: token.clone(),
        });
        if self.phase == Phase::Waiting {
            self.phase = Phase::Lobby;
        }
        info!(%conn, phase = self.phase.as_str(), "host authenticated");

        let mut outcome = Outcome::default();
        outcome.push(Outbound::to(conn, ServerEvent::HostAuthenticated { token }));
        outcome.push(self.roster_update());
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn reclaim_host(&mut self, conn: ConnectionId, token: &str) -> Result<Outcome, Rejection> {
        let host = self
            .host
            .as_mut()
            .filter(|h| !h.token.is_empty() && h.token == token)
            .ok_or(Rejection::Unauthorized)?;

        let fresh = issue_host_token();
        host.connection = Some(conn);
        host.token = fresh.clone();
        info!(%conn, "host reclaimed");

        let mut outcome = Outcome::default();
        outcome.push(Outbound::to(conn, ServerEvent::HostAuthenticated { token: fresh }));
        outcome.extend(self.full_sync(conn));
        Ok(outcome)
    }

    // Roster

    fn join(
        &mut self,
        conn: ConnectionId,
        name: Option<&str>,
        prior: Option<PlayerId>,
    ) -> Result<Outcome, Rejection> {
        if self.phase == Phase::Waiting {
            return Err(Rejection::SessionClosed);
        }

        let prior = match (self.connections.player_for(conn), prior) {
            (Some(bound), None) => Some(bound),
            (Some(bound), Some(requested)) if bound != requested => {
                return Err(Rejection::AlreadyJoined)
            }
            (_, requested) => requested,
        };

        let joined = self.roster.join(name, prior, conn)?;
        let superseded = self.connections.bind(conn, joined.id);
        self.grace.close(joined.id);

        // Anyone without a role mid-round becomes crew and never learns the word.
        if matches!(self.phase, Phase::Game | Phase::Voting) {
            if let Some(player) = self.roster.get_mut(joined.id) {
                if player.role == Role::Unassigned {
                    player.role = Role::Crew;
                }
            }
        }
        if self.phase == Phase::Leaderboard {
            self.refresh_leaderboard();
        }

        let Some(player) = self.roster.get(joined.id) else {
            return Err(Rejection::UnknownPlayer);
        };
        info!(
            player = %joined.id,
            name = %player.name,
            reconnect = joined.reconnect,
            phase = self.phase.as_str(),
            "player joined"
        );

        let mut outcome = Outcome::default();
        if let Some(old) = superseded {
            debug!(player = %joined.id, %old, %conn, "connection superseded");
            outcome.push(Outbound::to(
                old,
                ServerEvent::ConnectionReplaced {
                    player_id: joined.id,
                },
            ));
        }
        outcome.push(Outbound::to(
            conn,
            ServerEvent::IdentityAssigned {
                player_id: joined.id,
                name: player.name.clone(),
                reconnect: joined.reconnect,
            },
        ));
        outcome.push(Outbound::all(ServerEvent::PlayerJoined {
            player: player.view(),
        }));
        outcome.extend(self.full_sync(conn));
        outcome.push(self.roster_update());
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn leave(&mut self, conn: ConnectionId, target: Option<PlayerId>) -> Result<Outcome, Rejection> {
        let caller = self.connections.player_for(conn);
        match target {
            None => {
                let player = caller.ok_or(Rejection::UnknownConnection)?;
                self.connections.unbind_player(player);
                self.roster.mark_disconnected(player);

                let name = self.player_name(player);
                info!(%player, "player left");
                let mut outcome = Outcome::default();
                outcome
                    .grace_checks
                    .push(self.grace.on_disconnect(player, Instant::now()));
                outcome.push(Outbound::all(ServerEvent::PlayerLeft {
                    player_id: player,
                    name,
                }));
                outcome.push(self.roster_update());
                outcome.push(self.state_update());
                Ok(outcome)
            }
            Some(target) if caller == Some(target) => Ok(self.remove_player(target, false)),
            Some(target) if self.is_host(conn) => {
                if !self.roster.contains(target) {
                    return Err(Rejection::UnknownPlayer);
                }
                Ok(self.remove_player(target, true))
            }
            Some(_) => Err(Rejection::Unauthorized),
        }
    }

    /// Hard removal with cascade.
    fn remove_player(&mut self, id: PlayerId, kicked: bool) -> Outcome {
        let mut outcome = Outcome::default();
        let conn = self.connections.unbind_player(id);
        let Some(player) = self.roster.remove(id) else {
            return outcome;
        };
        self.votes.purge(id);
        self.grace.close(id);
        info!(player = %id, name = %player.name, kicked, "player removed");

        let event = if kicked {
            ServerEvent::PlayerKicked {
                player_id: id,
                name: player.name.clone(),
            }
        } else {
            ServerEvent::PlayerLeft {
                player_id: id,
                name: player.name.clone(),
            }
        };
        outcome.push(Outbound::all(event.clone()));
        if let Some(conn) = conn {
            // The removed connection is no longer part of the session.
            outcome.push(Outbound::to(conn, event));
        }

        let impostor_left = self.impostor() == Some(id);
        if impostor_left && matches!(self.phase, Phase::Game | Phase::Voting) {
            info!(player = %id, "impostor removed mid-round, aborting");
            outcome.push(self.roster_update());
            outcome.extend(self.abort_round(AbortReason::ImpostorLeft));
            return outcome;
        }

        // Losing a connected player can breach the minimum as well.
        if player.is_connected() && self.phase.is_active() {
            outcome
                .grace_checks
                .push(self.grace.on_disconnect(id, Instant::now()));
        }
        if self.phase == Phase::Leaderboard {
            self.refresh_leaderboard();
        }
        outcome.push(self.roster_update());
        outcome.push(self.state_update());
        outcome
    }

    // Round lifecycle

    fn start_round(&mut self, conn: ConnectionId) -> Result<Outcome, Rejection> {
        self.require_host(conn)?;
        if !matches!(self.phase, Phase::Lobby | Phase::Leaderboard) {
            return Err(Rejection::WrongPhase(self.phase.as_str()));
        }
        let connected = self.roster.connected_count();
        if connected < self.config.min_players {
            return Err(Rejection::NotEnoughPlayers {
                connected,
                required: self.config.min_players,
            });
        }

        let next_round = self.phase == Phase::Leaderboard;
        let mut outcome = self.begin_round()?;
        if next_round {
            outcome.push(Outbound::all(ServerEvent::NextRoundStarted {
                round: self.rounds_started,
            }));
        }
        outcome.push(self.roster_update());
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn begin_round(&mut self) -> Result<Outcome, Rejection> {
        let connected = self.roster.connected_ids();
        if connected.is_empty() {
            return Err(Rejection::NotEnoughPlayers {
                connected: 0,
                required: self.config.min_players,
            });
        }

        self.votes.clear();
        self.roster.clear_roles();
        let impostor = connected[self.rng.random_range(0..connected.len())];
        let word = self.words.next_word();
        for id in &connected {
            if let Some(player) = self.roster.get_mut(*id) {
                player.role = if *id == impostor {
                    Role::Impostor
                } else {
                    Role::Crew
                };
            }
        }

        self.rounds_started += 1;
        self.round = Some(RoundState {
            word,
            impostor,
            dealt: connected.iter().copied().collect(),
            timer: RoundTimer::start(
                self.rounds_started,
                self.round_duration,
                MAX_ROUND_DURATION,
                Instant::now(),
            ),
        });
        self.phase = Phase::Game;
        self.leaderboard = None;
        self.last_result = None;
        info!(
            round = self.rounds_started,
            players = connected.len(),
            duration_secs = self.round_duration.as_secs(),
            "round started"
        );

        let mut outcome = Outcome::default();
        for id in connected {
            if let Some(message) = self.role_message(id) {
                outcome.push(message);
            }
        }
        Ok(outcome)
    }

    fn check_expiry(&mut self) -> Outcome {
        let now = Instant::now();
        let expired = self
            .round
            .as_mut()
            .is_some_and(|round| round.timer.poll_expired(now));

        let mut outcome = Outcome::default();
        if expired {
            self.phase = Phase::Voting;
            self.votes.clear();
            info!(
                round = self.rounds_started,
                required = self.roster.connected_count(),
                "timer expired, voting open"
            );
        }
        outcome.push(self.state_update());
        outcome
    }

    fn cast_vote(&mut self, conn: ConnectionId, target: PlayerId) -> Result<Outcome, Rejection> {
        let voter = self
            .connections
            .player_for(conn)
            .ok_or(Rejection::UnknownConnection)?;
        if self.phase != Phase::Voting {
            return Err(Rejection::WrongPhase(self.phase.as_str()));
        }
        if voter != target && !self.roster.contains(target) {
            return Err(Rejection::UnknownPlayer);
        }
        self.votes.cast(voter, target)?;
        debug!(%voter, %target, received = self.votes.received(), "vote cast");

        let mut outcome = Outcome::default();
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn reveal(&mut self, conn: ConnectionId) -> Result<Outcome, Rejection> {
        self.require_host(conn)?;
        if self.phase != Phase::Voting {
            return Err(Rejection::WrongPhase(self.phase.as_str()));
        }
        let required = self.roster.connected_count();
        let received = self.votes.received();
        if received < required {
            return Err(Rejection::VotesOutstanding { received, required });
        }
        let impostor = self.impostor().ok_or(Rejection::NoActiveRound)?;

        // Removing the impostor aborts Game and Voting alike, so while a round
        // exists the impostor is on the roster; this only covers `score_round`
        // declining to score.
        let Some(score) = score_round(&self.votes, impostor, &self.roster) else {
            info!(%impostor, "impostor no longer present, nothing to reveal");
            return Ok(Outcome::default());
        };
        for (player, points) in &score.awards {
            self.roster.add_score(*player, *points);
        }

        self.round = None;
        self.votes.clear();
        self.roster.clear_roles();
        self.phase = Phase::Leaderboard;
        self.refresh_leaderboard();

        let result = RoundResult {
            voted_out: score.voted_out,
            impostor,
            correct: score.correct,
            num_correct: score.num_correct,
            num_possible: score.num_possible,
            leaderboard: self.leaderboard.clone().unwrap_or_default(),
        };
        info!(
            round = self.rounds_started,
            correct = result.correct,
            num_correct = result.num_correct,
            num_possible = result.num_possible,
            "results revealed"
        );
        self.last_result = Some(result.clone());

        let mut outcome = Outcome::default();
        outcome.push(Outbound::all(ServerEvent::RoundResult(result)));
        outcome.push(self.roster_update());
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn adjust_time(&mut self, conn: ConnectionId, delta_secs: i64) -> Result<Outcome, Rejection> {
        self.require_host(conn)?;
        if self.phase != Phase::Game {
            return Err(Rejection::WrongPhase(self.phase.as_str()));
        }
        let round = self.round.as_mut().ok_or(Rejection::NoActiveRound)?;
        let remaining = round.timer.adjust(delta_secs, Instant::now());
        debug!(delta_secs, remaining_secs = remaining.as_secs(), "round time adjusted");
        Ok(self.check_expiry())
    }

    fn toggle_pause(&mut self, conn: ConnectionId) -> Result<Outcome, Rejection> {
        self.require_host(conn)?;
        if self.phase != Phase::Game {
            return Err(Rejection::WrongPhase(self.phase.as_str()));
        }
        let round = self.round.as_mut().ok_or(Rejection::NoActiveRound)?;
        round.timer.toggle_pause(Instant::now());
        debug!(paused = round.timer.is_paused(), "round timer toggled");

        let mut outcome = Outcome::default();
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn set_round_duration(&mut self, conn: ConnectionId, seconds: u64) -> Result<Outcome, Rejection> {
        self.require_host(conn)?;
        self.round_duration = clamp_round_duration(Duration::from_secs(seconds));
        debug!(
            requested = seconds,
            applied = self.round_duration.as_secs(),
            "round duration set"
        );

        let mut outcome = Outcome::default();
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn return_to_lobby(&mut self, conn: ConnectionId) -> Result<Outcome, Rejection> {
        self.require_host(conn)?;
        if self.phase != Phase::Leaderboard {
            return Err(Rejection::WrongPhase(self.phase.as_str()));
        }
        if self.roster.connected_count() >= self.config.min_players {
            return Err(Rejection::RoundPlayable);
        }

        self.clear_round();
        self.phase = Phase::Lobby;
        info!("returned to lobby");

        let mut outcome = Outcome::default();
        outcome.push(self.state_update());
        Ok(outcome)
    }

    fn end_session(&mut self, conn: ConnectionId) -> Result<Outcome, Rejection> {
        self.require_host(conn)?;

        self.clear_round();
        self.roster.clear();
        self.connections.clear();
        self.grace.clear();
        self.host = None;
        self.phase = Phase::Waiting;
        info!("session ended");

        let mut outcome = Outcome::default();
        outcome.push(Outbound::all(ServerEvent::SessionEnded));
        outcome.push(self.roster_update());
        outcome.push(self.state_update());
        Ok(outcome)
    }

    /// Forced reversion to the lobby with a reason.
    fn abort_round(&mut self, reason: AbortReason) -> Outcome {
        self.clear_round();
        self.phase = Phase::Lobby;

        let mut outcome = Outcome::default();
        outcome.push(Outbound::all(ServerEvent::RoundAborted { reason }));
        outcome.push(self.state_update());
        outcome
    }

    fn clear_round(&mut self) {
        self.round = None;
        self.votes.clear();
        self.roster.clear_roles();
        self.leaderboard = None;
        self.last_result = None;
    }

    fn refresh_leaderboard(&mut self) {
        self.leaderboard = Some(self.roster.leaderboard());
        if let (Some(result), Some(board)) = (self.last_result.as_mut(), &self.leaderboard) {
            result.leaderboard = board.clone();
        }
    }

    // Messages

    fn player_name(&self, id: PlayerId) -> String {
        self.roster
            .get(id)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }

    fn state_update(&self) -> Outbound {
        Outbound::all(ServerEvent::StateUpdated(self.snapshot()))
    }

    fn roster_update(&self) -> Outbound {
        Outbound::all(ServerEvent::RosterUpdated {
            players: self.roster.views(),
        })
    }

    /// The role (and word, for dealt crew) of `id`, sent to their connection.
    fn role_message(&self, id: PlayerId) -> Option<Outbound> {
        if !matches!(self.phase, Phase::Game | Phase::Voting) {
            return None;
        }
        let round = self.round.as_ref()?;
        let role = self.roster.get(id)?.role;
        let conn = self.connections.connection_for(id)?;
        let word = match role {
            Role::Crew if round.dealt.contains(&id) => Some(round.word.clone()),
            Role::Crew | Role::Impostor => None,
            Role::Unassigned => return None,
        };
        Some(Outbound::to(conn, ServerEvent::RoleAssigned { role, word }))
    }

    /// Everything `conn` needs to catch up.
    fn full_sync(&self, conn: ConnectionId) -> Outcome {
        let mut outcome = Outcome::default();
        outcome.push(Outbound::to(conn, ServerEvent::StateUpdated(self.snapshot())));
        outcome.push(Outbound::to(
            conn,
            ServerEvent::RosterUpdated {
                players: self.roster.views(),
            },
        ));
        if let Some(message) = self
            .connections
            .player_for(conn)
            .and_then(|id| self.role_message(id))
        {
            outcome.push(message);
        }
        if let Some(result) = self.last_result.as_ref().filter(|_| self.phase == Phase::Leaderboard) {
            outcome.push(Outbound::to(conn, ServerEvent::RoundResult(result.clone())));
        }
        outcome
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
