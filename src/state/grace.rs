//! Disconnect grace windows.
//!
//! Every disconnect opens a window for that player and yields a `GraceCheck`
//! to run once the window closes. Each window carries its own event id, so a
//! check for a window that was closed by a reconnect (or replaced by a newer
//! disconnect) comes back `Stale`.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::state::player::PlayerId;

/// A delayed check the runtime must schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraceCheck {
    pub player: PlayerId,
    pub event_id: u64,
    pub after: Duration,
}

/// What a fired check should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceVerdict {
    /// The window no longer exists.
    Stale,
    /// Another player's window is still open; check again later.
    Deferred(GraceCheck),
    /// Enforce the minimum-player rule now.
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    event_id: u64,
    deadline: Instant,
    /// Own window has elapsed but enforcement was deferred
    lapsed: bool,
}

#[derive(Debug)]
pub struct DisconnectGraceMonitor {
    period: Duration,
    next_event_id: u64,
    windows: HashMap<PlayerId, Window>,
}

impl DisconnectGraceMonitor {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_event_id: 0,
            windows: HashMap::new(),
        }
    }

    /// Open a window for `player`, replacing any older one.
    pub fn on_disconnect(&mut self, player: PlayerId, now: Instant) -> GraceCheck {
        self.next_event_id += 1;
        let event_id = self.next_event_id;
        self.windows.insert(
            player,
            Window {
                event_id,
                deadline: now + self.period,
                lapsed: false,
            },
        );
        GraceCheck {
            player,
            event_id,
            after: self.period,
        }
    }

    /// Close `player`'s window, if any.
    pub fn close(&mut self, player: PlayerId) {
        self.windows.remove(&player);
    }

    /// True while `player`'s window is still running.
    pub fn is_open(&self, player: PlayerId, now: Instant) -> bool {
        self.windows
            .get(&player)
            .is_some_and(|w| !w.lapsed && w.deadline > now)
    }

    /// Resolve a fired check.
    pub fn fire(&mut self, player: PlayerId, event_id: u64, now: Instant) -> GraceVerdict {
        match self.windows.get(&player) {
            Some(window) if window.event_id == event_id => {}
            _ => return GraceVerdict::Stale,
        }

        let latest_other = self
            .windows
            .iter()
            .filter(|(id, w)| **id != player && !w.lapsed && w.deadline > now)
            .map(|(_, w)| w.deadline)
            .max();

        match latest_other {
            Some(deadline) => {
                if let Some(window) = self.windows.get_mut(&player) {
                    window.lapsed = true;
                }
                GraceVerdict::Deferred(GraceCheck {
                    player,
                    event_id,
                    after: deadline - now,
                })
            }
            None => {
                self.windows.remove(&player);
                GraceVerdict::Expired
            }
        }
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PERIOD: Duration = Duration::from_secs(10);

    #[test]
    fn test_expires_after_window() {
        let t0 = Instant::now();
        let mut monitor = DisconnectGraceMonitor::new(PERIOD);
        let player = PlayerId::new();

        let check = monitor.on_disconnect(player, t0);
        assert_eq!(check.after, PERIOD);
        assert!(monitor.is_open(player, t0));
        assert_eq!(
            monitor.fire(player, check.event_id, t0 + PERIOD),
            GraceVerdict::Expired
        );
        // Consumed
        assert_eq!(
            monitor.fire(player, check.event_id, t0 + PERIOD),
            GraceVerdict::Stale
        );
    }

    #[test]
    fn test_reconnect_makes_check_stale() {
        let t0 = Instant::now();
        let mut monitor = DisconnectGraceMonitor::new(PERIOD);
        let player = PlayerId::new();

        let check = monitor.on_disconnect(player, t0);
        monitor.close(player);
        assert_eq!(
            monitor.fire(player, check.event_id, t0 + PERIOD),
            GraceVerdict::Stale
        );
    }

    #[test]
    fn test_newer_disconnect_supersedes() {
        let t0 = Instant::now();
        let mut monitor = DisconnectGraceMonitor::new(PERIOD);
        let player = PlayerId::new();

        let first = monitor.on_disconnect(player, t0);
        let second = monitor.on_disconnect(player, t0 + Duration::from_secs(5));
        assert_ne!(first.event_id, second.event_id);
        assert_eq!(
            monitor.fire(player, first.event_id, t0 + PERIOD),
            GraceVerdict::Stale
        );
    }

    #[test]
    fn test_other_open_window_defers() {
        let t0 = Instant::now();
        let mut monitor = DisconnectGraceMonitor::new(PERIOD);
        let a = PlayerId::new();
        let b = PlayerId::new();

        let check_a = monitor.on_disconnect(a, t0);
        let check_b = monitor.on_disconnect(b, t0 + Duration::from_secs(4));

        let verdict = monitor.fire(a, check_a.event_id, t0 + PERIOD);
        assert_eq!(
            verdict,
            GraceVerdict::Deferred(GraceCheck {
                player: a,
                event_id: check_a.event_id,
                after: Duration::from_secs(4),
            })
        );
        // A's lapsed window does not hold B back
        let at = t0 + Duration::from_secs(14);
        assert_eq!(monitor.fire(b, check_b.event_id, at), GraceVerdict::Expired);
        assert_eq!(monitor.fire(a, check_a.event_id, at), GraceVerdict::Expired);
    }
}
