/// Per-username login throttling
use crate::error::{DashboardError, DashboardResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
struct Attempts {
    failures: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

impl Attempts {
    /// Nothing left to enforce: the lock ran out, or the failures are older than one lockout
    fn is_stale(&self, now: Instant, lockout: Duration) -> bool {
        match self.locked_until {
            Some(until) => until <= now,
            None => self.last_failure + lockout <= now,
        }
    }
}

#[derive(Debug)]
struct ThrottleState {
    attempts: HashMap<String, Attempts>,
    last_sweep: Instant,
}

/// Locks a username after too many consecutive failed logins
///
/// Keyed by the attempted name whether or not such an account exists.
/// Failures further apart than the lockout window do not accumulate, and
/// stale entries are swept at most once per window.
pub struct LoginThrottle {
    state: Mutex<ThrottleState>,
    max_failures: u32,
    lockout: Duration,
}

impl LoginThrottle {
    /// `max_failures` of zero disables throttling
    pub fn new(max_failures: u32, lockout: Duration) -> Self {
        Self {
            state: Mutex::new(ThrottleState {
                attempts: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            max_failures,
            lockout,
        }
    }

    /// Reject the attempt if the username is locked
    pub fn check(&self, username: &str) -> DashboardResult<()> {
        self.check_at(username, Instant::now())
    }

    /// Count a failure; returns the lockout if this one triggered it
    pub fn record_failure(&self, username: &str) -> Option<Duration> {
        self.record_failure_at(username, Instant::now())
    }

    /// Clear the failure count
    pub fn record_success(&self, username: &str) {
        self.lock().attempts.remove(username);
    }

    /// Drop every entry with nothing left to enforce; returns how many went
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Usernames currently tracked
    pub fn len(&self) -> usize {
        self.lock().attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_at(&self, username: &str, now: Instant) -> DashboardResult<()> {
        let mut state = self.lock();
        let Some(locked_until) = state.attempts.get(username).map(|entry| entry.locked_until)
        else {
            return Ok(());
        };

        match locked_until {
            Some(until) if until > now => Err(DashboardError::TooManyAttempts {
                retry_after: until - now,
            }),
            Some(_) => {
                state.attempts.remove(username);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record_failure_at(&self, username: &str, now: Instant) -> Option<Duration> {
        if self.max_failures == 0 {
            return None;
        }

        let mut state = self.lock();
        if now.saturating_duration_since(state.last_sweep) >= self.lockout {
            let swept = Self::sweep(&mut state, now, self.lockout);
            if swept > 0 {
                debug!("Swept {} stale login throttle entries", swept);
            }
        }

        let lockout = self.lockout;
        let entry = state
            .attempts
            .entry(username.to_string())
            .or_insert(Attempts {
                failures: 0,
                last_failure: now,
                locked_until: None,
            });
        if entry.is_stale(now, lockout) {
            entry.failures = 0;
            entry.locked_until = None;
        }
        entry.failures += 1;
        entry.last_failure = now;

        if entry.failures >= self.max_failures && entry.locked_until.is_none() {
            entry.locked_until = Some(now + lockout);
            warn!(
                "Locking {} for {}s after {} failed logins",
                username,
                lockout.as_secs(),
                entry.failures
            );
            return Some(lockout);
        }
        None
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut state = self.lock();
        Self::sweep(&mut state, now, self.lockout)
    }

    fn sweep(state: &mut ThrottleState, now: Instant, lockout: Duration) -> usize {
        let before = state.attempts.len();
        state
            .attempts
            .retain(|_, entry| !entry.is_stale(now, lockout));
        state.last_sweep = now;
        before - state.attempts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locks_after_max_failures() {
        let throttle = LoginThrottle::new(3, Duration::from_secs(300));
        let now = Instant::now();

        assert!(throttle.record_failure_at("mallory", now).is_none());
        assert!(throttle.record_failure_at("mallory", now).is_none());
        assert!(throttle.check_at("mallory", now).is_ok());
        assert_eq!(
            throttle.record_failure_at("mallory", now),
            Some(Duration::from_secs(300))
        );

        match throttle.check_at("mallory", now + Duration::from_secs(100)) {
            Err(DashboardError::TooManyAttempts { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(200))
            }
            other => panic!("expected lockout, got {:?}", other),
        }

        // Other names are unaffected
        assert!(throttle.check_at("alice", now).is_ok());
    }

    #[test]
    fn test_lock_expires() {
        let throttle = LoginThrottle::new(1, Duration::from_secs(10));
        let now = Instant::now();
        throttle.record_failure_at("bob", now);
        assert!(throttle.check_at("bob", now).is_err());
        assert!(throttle.check_at("bob", now + Duration::from_secs(11)).is_ok());
        assert!(throttle.check_at("bob", now + Duration::from_secs(11)).is_ok());
    }

    #[test]
    fn test_success_resets() {
        let throttle = LoginThrottle::new(2, Duration::from_secs(10));
        throttle.record_failure("carol");
        throttle.record_success("carol");
        assert!(throttle.record_failure("carol").is_none());
        assert!(throttle.check("carol").is_ok());
    }

    #[test]
    fn test_disabled() {
        let throttle = LoginThrottle::new(0, Duration::from_secs(10));
        for _ in 0..20 {
            assert!(throttle.record_failure("dave").is_none());
        }
        assert!(throttle.check("dave").is_ok());
    }

    #[test]
    fn test_stale_entries_are_swept() {
        let throttle = LoginThrottle::new(5, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..1_000 {
            throttle.record_failure_at(&format!("ghost{}", i), start);
        }
        assert_eq!(throttle.len(), 1_000);

        // The next failure after a full window sweeps everything stale
        throttle.record_failure_at("late", start + Duration::from_secs(61));
        assert_eq!(throttle.len(), 1);
    }

    #[test]
    fn test_purge_keeps_active_locks() {
        let throttle = LoginThrottle::new(1, Duration::from_secs(60));
        let start = Instant::now();
        throttle.record_failure_at("ghost", start);
        throttle.record_failure_at("locked", start + Duration::from_secs(50));

        let later = start + Duration::from_secs(70);
        assert_eq!(throttle.purge_expired_at(later), 1);
        assert!(throttle.check_at("locked", later).is_err());
        assert_eq!(
            throttle.purge_expired_at(start + Duration::from_secs(111)),
            1
        );
        assert!(throttle.is_empty());
    }

    #[test]
    fn test_failures_outside_window_do_not_accumulate() {
        let throttle = LoginThrottle::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(throttle.record_failure_at("erin", start).is_none());
        assert!(throttle
            .record_failure_at("erin", start + Duration::from_secs(90))
            .is_none());
        assert!(throttle
            .check_at("erin", start + Duration::from_secs(90))
            .is_ok());
    }
}
