/// Security audit trail
///
/// Events go out as structured `tracing` events under the `audit` target, so
/// they can be routed or filtered on their own (`RUST_LOG=audit=info`).
use serde::Serialize;
use tracing::{info, warn};

/// Kind of security event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess,
    LoginFailed,
    LoginLocked,
    Logout,
    PermissionDenied,
    AccountCreated,
    AccountUpdated,
    AccountActivated,
    AccountDeactivated,
    AccountDeleted,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess => "login_success",
            AuditEvent::LoginFailed => "login_failed",
            AuditEvent::LoginLocked => "login_locked",
            AuditEvent::Logout => "logout",
            AuditEvent::PermissionDenied => "permission_denied",
            AuditEvent::AccountCreated => "account_created",
            AuditEvent::AccountUpdated => "account_updated",
            AuditEvent::AccountActivated => "account_activated",
            AuditEvent::AccountDeactivated => "account_deactivated",
            AuditEvent::AccountDeleted => "account_deleted",
        }
    }

    fn is_failure(&self) -> bool {
        matches!(
            self,
            AuditEvent::LoginFailed | AuditEvent::LoginLocked | AuditEvent::PermissionDenied
        )
    }
}

/// Audit logger; a disabled logger drops everything
#[derive(Debug, Clone, Copy)]
pub struct AuditLog {
    enabled: bool,
}

impl AuditLog {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an event performed by `actor`, optionally on account `target`
    pub fn record(&self, event: AuditEvent, actor: &str, target: Option<&str>, detail: &str) {
        if !self.enabled {
            return;
        }

        let target_account = target.unwrap_or("-");
        if event.is_failure() {
            warn!(
                target: "audit",
                event = event.as_str(),
                actor,
                account = target_account,
                success = false,
                "{}",
                detail
            );
        } else {
            info!(
                target: "audit",
                event = event.as_str(),
                actor,
                account = target_account,
                success = true,
                "{}",
                detail
            );
        }
    }

    pub fn login_success(&self, username: &str) {
        self.record(AuditEvent::LoginSuccess, username, None, "login succeeded");
    }

    pub fn login_failed(&self, username: &str) {
        self.record(AuditEvent::LoginFailed, username, None, "login failed");
    }

    pub fn login_locked(&self, username: &str, seconds: u64) {
        self.record(
            AuditEvent::LoginLocked,
            username,
            None,
            &format!("locked for {}s after repeated failures", seconds),
        );
    }

    pub fn logout(&self, username: &str) {
        self.record(AuditEvent::Logout, username, None, "logged out");
    }

    pub fn permission_denied(&self, username: &str, required: &str) {
        self.record(
            AuditEvent::PermissionDenied,
            username,
            None,
            &format!("missing {}", required),
        );
    }

    pub fn account_change(&self, event: AuditEvent, actor: &str, account: &str) {
        self.record(event, actor, Some(account), event.as_str());
    }
}
