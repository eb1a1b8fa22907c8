/// Token-addressed session registry with idle expiry
use crate::{
    account::Account,
    error::{DashboardError, DashboardResult},
    session::Session,
};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

struct Entry {
    session: Session,
    last_seen: Instant,
}

/// All live sessions, keyed by opaque token
///
/// Expired sessions are dropped lazily on access.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Register a session and hand back its token
    pub fn insert(&self, session: Session) -> DashboardResult<Uuid> {
        let token = Uuid::new_v4();
        let mut sessions = self.write()?;
        sessions.insert(
            token,
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );
        Ok(token)
    }

    /// Look up a session and mark it as used
    pub fn get(&self, token: &Uuid) -> DashboardResult<Option<Session>> {
        self.get_at(token, Instant::now())
    }

    fn get_at(&self, token: &Uuid, now: Instant) -> DashboardResult<Option<Session>> {
        let mut sessions = self.write()?;
        let Some(entry) = sessions.get_mut(token) else {
            return Ok(None);
        };
        if now.duration_since(entry.last_seen) <= self.idle_timeout {
            entry.last_seen = now;
            return Ok(Some(entry.session.clone()));
        }

        debug!("Session {} expired", token);
        sessions.remove(token);
        Ok(None)
    }

    /// Drop one session; false if it was not there
    pub fn remove(&self, token: &Uuid) -> DashboardResult<bool> {
        Ok(self.write()?.remove(token).is_some())
    }

    /// Drop every session belonging to an account
    pub fn invalidate_user(&self, username: &str) -> DashboardResult<usize> {
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.session.username() != Some(username));
        Ok(before - sessions.len())
    }

    /// Re-snapshot role and permissions for every session of an account
    pub fn refresh_user(&self, account: &Account) -> DashboardResult<usize> {
        let mut sessions = self.write()?;
        let mut refreshed = 0;
        for entry in sessions.values_mut() {
            if entry.session.username() == Some(account.username.as_str()) {
                entry.session.refresh(account);
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }

    /// Drop every idle session
    pub fn purge_expired(&self) -> DashboardResult<usize> {
        let now = Instant::now();
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) <= self.idle_timeout);
        Ok(before - sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> DashboardResult<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Entry>>> {
        self.sessions
            .write()
            .map_err(|e| DashboardError::Internal(format!("Session registry poisoned: {}", e)))
    }
}
