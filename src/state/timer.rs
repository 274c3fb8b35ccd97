//! Round countdown.
//!
//! Pure bookkeeping; the runtime drives it with a once-per-second ticker and
//! the session asks `poll_expired` on every tick and adjustment. All methods
//! take `now` so the clock stays with the caller.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Countdown {
    Running { deadline: Instant },
    Paused { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct RoundTimer {
    round_id: u64,
    max: Duration,
    countdown: Countdown,
    fired: bool,
}

impl RoundTimer {
    /// Start counting down `duration`, never more than `max`.
    pub fn start(round_id: u64, duration: Duration, max: Duration, now: Instant) -> Self {
        Self {
            round_id,
            max,
            countdown: Countdown::Running {
                deadline: now + duration.min(max),
            },
            fired: false,
        }
    }

    /// Generation of the round this timer belongs to.
    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    /// Time left as of `now`.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.countdown {
            Countdown::Running { deadline } => deadline.saturating_duration_since(now),
            Countdown::Paused { remaining } => remaining,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.countdown, Countdown::Paused { .. })
    }

    /// Freeze the remaining time. No-op if already paused.
    pub fn pause(&mut self, now: Instant) {
        if let Countdown::Running { .. } = self.countdown {
            self.countdown = Countdown::Paused {
                remaining: self.remaining(now),
            };
        }
    }

    /// Continue from the frozen remaining time. No-op if running.
    pub fn resume(&mut self, now: Instant) {
        if let Countdown::Paused { remaining } = self.countdown {
            self.countdown = Countdown::Running {
                deadline: now + remaining,
            };
        }
    }

    pub fn toggle_pause(&mut self, now: Instant) {
        if self.is_paused() {
            self.resume(now);
        } else {
            self.pause(now);
        }
    }

    /// Add (or with a negative delta, remove) time, clamped to `[0, max]`.
    /// Applies to the frozen snapshot while paused.
    pub fn adjust(&mut self, delta_secs: i64, now: Instant) -> Duration {
        let delta = Duration::from_secs(delta_secs.unsigned_abs());
        let current = self.remaining(now);
        let adjusted = if delta_secs >= 0 {
            current.saturating_add(delta)
        } else {
            current.saturating_sub(delta)
        }
        .min(self.max);

        self.countdown = match self.countdown {
            Countdown::Running { .. } => Countdown::Running {
                deadline: now + adjusted,
            },
            Countdown::Paused { .. } => Countdown::Paused {
                remaining: adjusted,
            },
        };
        adjusted
    }

    /// True exactly once, the first time remaining time is observed at zero.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        if self.fired || !self.remaining(now).is_zero() {
            return false;
        }
        self.fired = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAX: Duration = Duration::from_secs(300);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_counts_down() {
        let t0 = Instant::now();
        let timer = RoundTimer::start(1, secs(60), MAX, t0);

        assert_eq!(timer.remaining(t0), secs(60));
        assert_eq!(timer.remaining(t0 + secs(45)), secs(15));
        assert_eq!(timer.remaining(t0 + secs(90)), Duration::ZERO);
    }

    #[test]
    fn test_start_clamped_to_max() {
        let t0 = Instant::now();
        let timer = RoundTimer::start(1, secs(900), MAX, t0);
        assert_eq!(timer.remaining(t0), MAX);
    }

    #[test]
    fn test_pause_freezes_remaining() {
        let t0 = Instant::now();
        let mut timer = RoundTimer::start(1, secs(60), MAX, t0);

        timer.pause(t0 + secs(10));
        assert!(timer.is_paused());
        assert_eq!(timer.remaining(t0 + secs(40)), secs(50));

        timer.resume(t0 + secs(40));
        assert!(!timer.is_paused());
        assert_eq!(timer.remaining(t0 + secs(50)), secs(40));
    }

    #[test]
    fn test_adjust_running_and_paused() {
        let t0 = Instant::now();
        let mut timer = RoundTimer::start(1, secs(60), MAX, t0);

        assert_eq!(timer.adjust(30, t0), secs(90));
        assert_eq!(timer.remaining(t0 + secs(10)), secs(80));

        timer.toggle_pause(t0 + secs(10));
        assert_eq!(timer.adjust(-20, t0 + secs(20)), secs(60));
        assert_eq!(timer.remaining(t0 + secs(100)), secs(60));
    }

    #[test]
    fn test_adjust_clamps() {
        let t0 = Instant::now();
        let mut timer = RoundTimer::start(1, secs(60), MAX, t0);

        assert_eq!(timer.adjust(10_000, t0), MAX);
        assert_eq!(timer.adjust(-10_000, t0), Duration::ZERO);
    }

    #[test]
    fn test_expiry_fires_once() {
        let t0 = Instant::now();
        let mut timer = RoundTimer::start(1, secs(60), MAX, t0);

        assert!(!timer.poll_expired(t0 + secs(59)));
        assert!(timer.poll_expired(t0 + secs(60)));
        assert!(!timer.poll_expired(t0 + secs(61)));
    }

    #[test]
    fn test_adjust_to_zero_expires_while_paused() {
        let t0 = Instant::now();
        let mut timer = RoundTimer::start(1, secs(60), MAX, t0);
        timer.pause(t0);

        timer.adjust(-60, t0);
        assert!(timer.poll_expired(t0));
    }
}
