//! Error types.
//!
//! Nothing here is fatal. A `Rejection` leaves session state untouched and is
//! either dropped silently or acknowledged to the requester only.

use std::path::PathBuf;

use thiserror::Error;

/// Why an inbound action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Host-only action from a non-host connection.
    #[error("not permitted")]
    Unauthorized,

    /// A host is already bound.
    #[error("a host is already assigned")]
    DuplicateHost,

    #[error("invalid host credentials")]
    BadCredentials,

    #[error("the session is not accepting players yet")]
    SessionClosed,

    #[error("a display name is required")]
    EmptyName,

    #[error("the name '{0}' is already taken")]
    NameTaken(String),

    #[error("this connection already plays as someone else")]
    AlreadyJoined,

    #[error("connection is not bound to a player")]
    UnknownConnection,

    #[error("no such player")]
    UnknownPlayer,

    #[error("action not allowed during {0}")]
    WrongPhase(&'static str),

    #[error("not enough connected players ({connected}/{required})")]
    NotEnoughPlayers { connected: usize, required: usize },

    #[error("cannot vote for yourself")]
    SelfVote,

    #[error("waiting for votes ({received}/{required})")]
    VotesOutstanding { received: usize, required: usize },

    #[error("no round is active")]
    NoActiveRound,

    #[error("enough players are connected to keep playing")]
    RoundPlayable,
}

impl Rejection {
    /// Authorization failures and self-votes are invisible to clients.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::DuplicateHost | Self::SelfVote)
    }
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Word pool construction and persistence failures.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("word source is empty")]
    EmptySource,

    #[error("word pool file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("word pool file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The session task is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("session task has shut down")]
    Closed,
}
