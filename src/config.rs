//! Session configuration.
//!
//! Values come from `SessionConfig::default()` or the process environment via
//! `SessionConfig::from_env()`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Shortest allowed round (1 minute).
pub const MIN_ROUND_DURATION: Duration = Duration::from_secs(60);

/// Longest allowed round (5 minutes).
pub const MAX_ROUND_DURATION: Duration = Duration::from_secs(300);

/// Default minimum connected players for an active round.
pub const DEFAULT_MIN_PLAYERS: usize = 3;

/// Default disconnect grace window.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Default round duration (3 minutes).
pub const DEFAULT_ROUND_DURATION: Duration = Duration::from_secs(180);

/// Default word pool refill threshold.
pub const DEFAULT_REFILL_THRESHOLD: usize = 5;

/// Interval between timer ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Connected players required to enter or stay in Game/Voting/Leaderboard
    pub min_players: usize,

    /// Delay after a disconnect before the minimum is enforced
    pub grace_period: Duration,

    /// Initial round duration, always within the round bounds
    pub round_duration: Duration,

    /// Word pool refills once fewer than this many words remain
    pub refill_threshold: usize,

    /// Where the remaining word set is persisted, if anywhere
    pub word_pool_path: Option<PathBuf>,

    /// Shared host secret
    pub host_secret: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_players: DEFAULT_MIN_PLAYERS,
            grace_period: DEFAULT_GRACE_PERIOD,
            round_duration: DEFAULT_ROUND_DURATION,
            refill_threshold: DEFAULT_REFILL_THRESHOLD,
            word_pool_path: None,
            host_secret: String::new(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from `IMPOSTOR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host_secret = env::var("IMPOSTOR_HOST_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("IMPOSTOR_HOST_SECRET"))?;

        let min_players = parse_var("IMPOSTOR_MIN_PLAYERS", DEFAULT_MIN_PLAYERS)?;
        let grace_secs = parse_var("IMPOSTOR_GRACE_SECS", DEFAULT_GRACE_PERIOD.as_secs())?;
        let round_secs = parse_var("IMPOSTOR_ROUND_SECS", DEFAULT_ROUND_DURATION.as_secs())?;
        let refill_threshold = parse_var("IMPOSTOR_REFILL_THRESHOLD", DEFAULT_REFILL_THRESHOLD)?;
        let word_pool_path = env::var_os("IMPOSTOR_WORD_POOL_PATH").map(PathBuf::from);

        Ok(Self {
            min_players,
            grace_period: Duration::from_secs(grace_secs),
            round_duration: Duration::from_secs(round_secs),
            refill_threshold,
            word_pool_path,
            host_secret,
        }
        .normalized())
    }

    /// Pull every value into its allowed range.
    pub fn normalized(mut self) -> Self {
        self.min_players = self.min_players.max(2);
        self.round_duration = clamp_round_duration(self.round_duration);
        self.refill_threshold = self.refill_threshold.max(1);
        self
    }
}

/// Clamp a requested round duration to the allowed bounds.
pub fn clamp_round_duration(duration: Duration) -> Duration {
    duration.clamp(MIN_ROUND_DURATION, MAX_ROUND_DURATION)
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
