//! Session state.
//!
//! - `player` - player roster (identity, connection state, role, score)
//! - `connection` - connection <-> player index
//! - `words` - secret word supply
//! - `votes` - vote board and round scoring
//! - `timer` - round countdown
//! - `grace` - disconnect grace windows
//! - `session` - the phase state machine that owns all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Session                                  │
//! │                                                                       │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌──────────────────┐     │
//! │  │  PlayerRoster  │  │ ConnectionRegistry │  │    VoteBoard     │     │
//! │  │                │  │                    │  │                  │     │
//! │  │ player_id →    │  │ connection →       │  │ voter →          │     │
//! │  │   Player       │  │   player_id        │  │   target         │     │
//! │  │                │  │ player_id →        │  │                  │     │
//! │  │ departed       │  │   connection       │  │                  │     │
//! │  └────────────────┘  └────────────────────┘  └──────────────────┘     │
//! │                                                                       │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌──────────────────┐     │
//! │  │    WordPool    │  │ RoundState         │  │ DisconnectGrace  │     │
//! │  │                │  │  word, impostor,   │  │ Monitor          │     │
//! │  │ remaining set  │  │  RoundTimer        │  │ player → window  │     │
//! │  └────────────────┘  └────────────────────┘  └──────────────────┘     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod connection;
pub mod grace;
pub mod player;
pub mod session;
pub mod timer;
pub mod votes;
pub mod words;

pub use connection::{ConnectionId, ConnectionRegistry};
pub use grace::{DisconnectGraceMonitor, GraceCheck, GraceVerdict};
pub use player::{ConnectionState, DepartedPlayer, Joined, Player, PlayerId, PlayerRoster, Role};
pub use session::{Outcome, Phase, Session};
pub use timer::RoundTimer;
pub use votes::{score_round, RoundScore, VoteBoard};
pub use words::WordPool;
