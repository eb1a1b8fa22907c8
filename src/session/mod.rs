/// Session and permission gate
///
/// A `Session` is the per-client "who is logged in" state. It holds a
/// snapshot of the account's role and permissions taken at login, and every
/// protected operation asks it before proceeding.

mod registry;
mod throttle;

pub use registry::SessionRegistry;
pub use throttle::LoginThrottle;

use crate::{
    account::{grants, Account, CredentialStore, Permission, PermissionSet, Role},
    error::{DashboardError, DashboardResult},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity and capability snapshot of a logged-in account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub logged_in_at: DateTime<Utc>,
}

impl Principal {
    fn from_account(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
            permissions: account.permissions.clone(),
            logged_in_at: Utc::now(),
        }
    }
}

/// Session state: logged out, or logged in as one principal
#[derive(Debug, Clone, Default)]
pub struct Session {
    principal: Option<Principal>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticate against the store
    ///
    /// On failure the session is left exactly as it was.
    pub fn login(&mut self, username: &str, password: &str, store: &mut CredentialStore) -> bool {
        match store.authenticate(username, password) {
            Some(account) => {
                self.principal = Some(Principal::from_account(&account));
                true
            }
            None => false,
        }
    }

    pub fn logout(&mut self) {
        self.principal = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.username.as_str())
    }

    /// Same escalation rule as `CredentialStore::has_permission`
    pub fn check_permission(&self, permission: Permission) -> bool {
        self.principal
            .as_ref()
            .map(|p| grants(&p.permissions, permission))
            .unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.principal
            .as_ref()
            .map(|p| p.role == Role::Admin)
            .unwrap_or(false)
    }

    /// Guard for permission-gated operations
    pub fn require_permission(&self, permission: Permission) -> DashboardResult<&Principal> {
        let principal = self
            .principal
            .as_ref()
            .ok_or(DashboardError::AuthenticationRequired)?;
        if !grants(&principal.permissions, permission) {
            return Err(DashboardError::PermissionDenied(permission.to_string()));
        }
        Ok(principal)
    }

    /// Guard for admin-only operations
    pub fn require_admin(&self) -> DashboardResult<&Principal> {
        let principal = self
            .principal
            .as_ref()
            .ok_or(DashboardError::AuthenticationRequired)?;
        if principal.role != Role::Admin {
            return Err(DashboardError::PermissionDenied("admin role".to_string()));
        }
        Ok(principal)
    }

    /// Reload the role and permission snapshot from an updated account
    pub(crate) fn refresh(&mut self, account: &Account) {
        if let Some(principal) = self.principal.as_mut() {
            if principal.username == account.username {
                principal.role = account.role;
                principal.permissions = account.permissions.clone();
            }
        }
    }
}
