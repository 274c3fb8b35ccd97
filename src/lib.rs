//! Impostor Session Library
//!
//! Coordinates one live session of a hidden-word social deduction game: one
//! player per round is secretly the impostor, everyone else shares a word,
//! and the crew votes to expose the impostor.
//!
//! # Overview
//!
//! - **Roster and connections** - stable identities across reconnects, a
//!   bidirectional connection index, soft and hard removal.
//!
//! - **Phases** - `Waiting → Lobby → Game → Voting → Leaderboard`, with forced
//!   reversion to the lobby when the impostor leaves or too few players remain.
//!
//! - **Round timer and grace windows** - background tasks that feed back into
//!   the same command queue as client actions.
//!
//! - **Votes and scoring** - deterministic tally (ties go to the lowest player
//!   id) and per-round scoring.
//!
//! # Design Principles
//!
//! 1. **One mutation point** - `state::Session` is synchronous and owned by a
//!    single task (`runtime`); nothing else touches session state.
//!
//! 2. **No transport** - callers feed `protocol::Action`s in and deliver
//!    `protocol::Outbound` messages out.
//!
//! 3. **Unauthorized means invisible** - host-only actions from anyone else
//!    are dropped without a reply.
//!
//! # Example
//!
//! ```rust
//! use impostor_session::{
//!     auth::SharedSecret,
//!     protocol::Action,
//!     state::{ConnectionId, Phase, Session, WordPool},
//!     SessionConfig,
//! };
//!
//! let words = WordPool::new(vec!["lighthouse", "volcano", "orchestra"], 1).unwrap();
//! let mut session = Session::new(
//!     SessionConfig::default(),
//!     words,
//!     Box::new(SharedSecret::new("hunter2")),
//! );
//!
//! let host = ConnectionId::new(0);
//! session.handle(host, Action::AuthenticateHost { password: "hunter2".into() });
//! assert_eq!(session.phase(), Phase::Lobby);
//!
//! for (n, name) in ["Alice", "Bob", "Cara"].iter().enumerate() {
//!     session.handle(
//!         ConnectionId::new(n as u64 + 1),
//!         Action::Join { name: Some(name.to_string()), player_id: None },
//!     );
//! }
//! session.handle(host, Action::StartRound);
//! assert_eq!(session.phase(), Phase::Game);
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod state;

pub use config::SessionConfig;
pub use error::{ConfigError, PoolError, Rejection, RuntimeError};
pub use runtime::{spawn_session, spawn_with_config, SessionHandle};
pub use state::*;
