/// Account management
///
/// Accounts, roles and permission tags, plus the file-backed credential store
/// that owns them.

mod backend;
mod password;
mod store;

pub use backend::{AccountBackend, Accounts, JsonFileBackend, MemoryBackend};
pub use password::{hash_password, verify_password};
pub use store::{CredentialStore, StoreSettings, BOOTSTRAP_ADMIN};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Viewer => "viewer",
        }
    }

    /// Permission set conventionally attached to the role
    pub fn default_permissions(&self) -> PermissionSet {
        match self {
            Role::Admin => Permission::ALL.into_iter().collect(),
            Role::User => [
                Permission::Dashboard,
                Permission::Sensors,
                Permission::AllSensors,
            ]
            .into_iter()
            .collect(),
            Role::Viewer => [Permission::Dashboard, Permission::Sensors]
                .into_iter()
                .collect(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Capability tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Dashboard,
    Sensors,
    /// Blanket grant: satisfies every permission check
    AllSensors,
    UserManagement,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Dashboard,
        Permission::Sensors,
        Permission::AllSensors,
        Permission::UserManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Dashboard => "dashboard",
            Permission::Sensors => "sensors",
            Permission::AllSensors => "all_sensors",
            Permission::UserManagement => "user_management",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}

/// Ordered so the account file diffs cleanly
pub type PermissionSet = BTreeSet<Permission>;

/// Shared escalation rule for every permission check
///
/// A set grants a permission if it contains it, or if it holds `all_sensors`.
pub fn grants(permissions: &PermissionSet, permission: Permission) -> bool {
    permissions.contains(&permission) || permissions.contains(&Permission::AllSensors)
}

/// Durable account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// `None` until the first successful login
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Fields accepted by `CredentialStore::update_account`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub password: Option<String>,
    pub role: Option<Role>,
    pub permissions: Option<PermissionSet>,
    pub active: Option<bool>,
}

/// Account as shown to administrators (no password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub username: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
            permissions: account.permissions.clone(),
            active: account.active,
            created_by: account.created_by.clone(),
            created_at: account.created_at,
            last_login: account.last_login,
        }
    }
}

/// Account creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    /// Defaults to the role's permission set
    pub permissions: Option<PermissionSet>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}
