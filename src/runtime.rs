//! Session actor.
//!
//! One task owns the `Session` and applies commands in arrival order, which
//! makes it the single mutation point for client actions, timer ticks, and
//! grace checks alike. Background tasks only ever send commands back into the
//! same queue.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::SharedSecret;
use crate::config::{SessionConfig, TICK_INTERVAL};
use crate::error::RuntimeError;
use crate::protocol::{Action, Outbound, SessionSnapshot};
use crate::state::connection::ConnectionId;
use crate::state::grace::GraceCheck;
use crate::state::player::PlayerId;
use crate::state::session::{Outcome, Session};
use crate::state::words::WordPool;

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 1024;

/// Work items for the session task.
#[derive(Debug)]
pub enum Command {
    Action {
        conn: ConnectionId,
        action: Action,
    },
    Disconnected {
        conn: ConnectionId,
    },
    Tick {
        round_id: u64,
    },
    GraceExpired {
        player: PlayerId,
        event_id: u64,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Transport-facing handle. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<Outbound>,
}

impl SessionHandle {
    /// Submit an inbound action from `conn`.
    pub async fn submit(&self, conn: ConnectionId, action: Action) -> Result<(), RuntimeError> {
        self.send(Command::Action { conn, action }).await
    }

    /// Report that the transport lost `conn`.
    pub async fn disconnected(&self, conn: ConnectionId) -> Result<(), RuntimeError> {
        self.send(Command::Disconnected { conn }).await
    }

    /// Current state, after every previously submitted command has applied.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Outbound messages from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.event_tx.subscribe()
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx.send(cmd).await.map_err(|_| RuntimeError::Closed)
    }
}

/// Spawn the session task. It runs until every handle is dropped.
pub fn spawn_session(session: Session) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = SessionActor {
        session,
        scheduler: cmd_tx.downgrade(),
        event_tx: event_tx.clone(),
        ticker: None,
        shutdown: CancellationToken::new(),
    };
    tokio::spawn(actor.run(cmd_rx));

    SessionHandle { cmd_tx, event_tx }
}

/// Build a session from `config` with a shared-secret host check and spawn it.
pub fn spawn_with_config(config: SessionConfig, words: WordPool) -> SessionHandle {
    let verifier = SharedSecret::new(config.host_secret.clone());
    spawn_session(Session::new(config, words, Box::new(verifier)))
}

struct RoundTicker {
    round_id: u64,
    cancel: CancellationToken,
}

struct SessionActor {
    session: Session,

    /// Weak so background tasks never keep the queue open
    scheduler: mpsc::WeakSender<Command>,

    event_tx: broadcast::Sender<Outbound>,
    ticker: Option<RoundTicker>,
    shutdown: CancellationToken,
}

impl SessionActor {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        info!("session task started");
        while let Some(cmd) = cmd_rx.recv().await {
            let outcome = match cmd {
                Command::Action { conn, action } => self.session.handle(conn, action),
                Command::Disconnected { conn } => self.session.disconnected(conn),
                Command::Tick { round_id } => self.session.tick(round_id),
                Command::GraceExpired { player, event_id } => {
                    self.session.grace_expired(player, event_id)
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.session.snapshot());
                    continue;
                }
            };
            self.apply(outcome);
            self.reconcile_ticker();
        }

        if let Some(ticker) = self.ticker.take() {
            ticker.cancel.cancel();
        }
        self.shutdown.cancel();
        info!("session task ended");
    }

    fn apply(&mut self, outcome: Outcome) {
        for message in outcome.messages {
            // No subscribers is fine; delivery is fire-and-forget.
            let _ = self.event_tx.send(message);
        }
        for check in outcome.grace_checks {
            self.schedule_grace_check(check);
        }
    }

    /// Keep exactly one ticker running for the active Game round.
    fn reconcile_ticker(&mut self) {
        let wanted = self.session.active_ticker();
        if self.ticker.as_ref().map(|t| t.round_id) == wanted {
            return;
        }
        if let Some(old) = self.ticker.take() {
            debug!(round = old.round_id, "stopping round ticker");
            old.cancel.cancel();
        }
        if let Some(round_id) = wanted {
            let cancel = self.shutdown.child_token();
            spawn_ticker(round_id, self.scheduler.clone(), cancel.clone());
            self.ticker = Some(RoundTicker { round_id, cancel });
        }
    }

    fn schedule_grace_check(&self, check: GraceCheck) {
        let scheduler = self.scheduler.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(check.after) => {
                    if let Some(tx) = scheduler.upgrade() {
                        let _ = tx
                            .send(Command::GraceExpired {
                                player: check.player,
                                event_id: check.event_id,
                            })
                            .await;
                    }
                }
            }
        });
    }
}

fn spawn_ticker(round_id: u64, scheduler: mpsc::WeakSender<Command>, cancel: CancellationToken) {
    debug!(round = round_id, "starting round ticker");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let Some(tx) = scheduler.upgrade() else {
                        break;
                    };
                    if tx.send(Command::Tick { round_id }).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}
