/// Credential store: the account table plus its lifecycle rules
use crate::{
    account::{
        grants, hash_password, verify_password, Account, AccountBackend, AccountUpdate, Accounts,
        Permission, PermissionSet, Role,
    },
    config::AuthConfig,
    error::{DashboardError, DashboardResult},
};
use chrono::Utc;
use tracing::{error, info, warn};

/// Account seeded on first run; it can never be deleted or deactivated
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// Hashing and bootstrap settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub password_salt: String,
    pub default_admin_password: String,
}

impl From<&AuthConfig> for StoreSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            password_salt: config.password_salt.clone(),
            default_admin_password: config.default_admin_password.clone(),
        }
    }
}

/// Credential store
///
/// The whole table lives in memory and is the source of truth. Every
/// mutation is applied in memory first and then the table is rewritten
/// through the backend. A failed write leaves the in-memory change in
/// place and reports `StoreWrite`.
///
/// Not safe for several processes sharing one backing file.
pub struct CredentialStore {
    backend: Box<dyn AccountBackend>,
    settings: StoreSettings,
    accounts: Accounts,
}

impl CredentialStore {
    /// Create an empty, unloaded store
    pub fn new(backend: Box<dyn AccountBackend>, settings: StoreSettings) -> Self {
        Self {
            backend,
            settings,
            accounts: Accounts::new(),
        }
    }

    /// Create a store and bootstrap it
    ///
    /// Bootstrap failures are logged; an unreadable table leaves the store
    /// empty, which locks everyone out until it is fixed.
    pub fn open(backend: Box<dyn AccountBackend>, settings: StoreSettings) -> Self {
        let mut store = Self::new(backend, settings);
        if let Err(e) = store.bootstrap() {
            error!("Account store bootstrap failed: {}", e);
        }
        store
    }

    /// Load the table, seeding the admin account if nothing is stored
    pub fn bootstrap(&mut self) -> DashboardResult<()> {
        match self.backend.load() {
            Ok(Some(accounts)) if !accounts.is_empty() => {
                info!("Loaded {} accounts", accounts.len());
                self.accounts = accounts;
                Ok(())
            }
            Ok(_) => {
                info!("No accounts stored, creating default admin account");
                let admin = Account {
                    username: BOOTSTRAP_ADMIN.to_string(),
                    password_hash: hash_password(
                        &self.settings.default_admin_password,
                        &self.settings.password_salt,
                    ),
                    role: Role::Admin,
                    permissions: Role::Admin.default_permissions(),
                    active: true,
                    created_by: "system".to_string(),
                    created_at: Utc::now(),
                    last_login: None,
                };
                self.accounts.clear();
                self.accounts.insert(BOOTSTRAP_ADMIN.to_string(), admin);
                self.save()
            }
            Err(e) => {
                // Never overwrite a table we could not read
                self.accounts.clear();
                Err(e)
            }
        }
    }

    /// Verify credentials and record the login
    ///
    /// Unknown user, inactive account and wrong password are all `None`.
    pub fn authenticate(&mut self, username: &str, password: &str) -> Option<Account> {
        let salt = &self.settings.password_salt;
        let account = self.accounts.get_mut(username)?;
        if !account.active || !verify_password(password, salt, &account.password_hash) {
            return None;
        }

        account.last_login = Some(Utc::now());
        let account = account.clone();

        if let Err(e) = self.save() {
            error!("Failed to record login for {}: {}", username, e);
        }

        Some(account)
    }

    /// Insert a new active account
    pub fn create_account(
        &mut self,
        username: &str,
        password: &str,
        role: Role,
        permissions: PermissionSet,
        created_by: &str,
    ) -> DashboardResult<()> {
        if username.trim().is_empty() {
            return Err(DashboardError::Validation("Username is required".to_string()));
        }
        if password.is_empty() {
            return Err(DashboardError::Validation("Password is required".to_string()));
        }
        if self.accounts.contains_key(username) {
            return Err(DashboardError::DuplicateAccount(username.to_string()));
        }

        let account = Account {
            username: username.to_string(),
            password_hash: hash_password(password, &self.settings.password_salt),
            role,
            permissions,
            active: true,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            last_login: None,
        };
        self.accounts.insert(username.to_string(), account);
        info!("Created account {} ({}) by {}", username, role, created_by);

        self.save()
    }

    /// Apply a partial update
    ///
    /// A password is hashed before storage. Changing the role without
    /// supplying permissions resets the permissions to the role's defaults.
    pub fn update_account(
        &mut self,
        username: &str,
        update: AccountUpdate,
    ) -> DashboardResult<Account> {
        if username == BOOTSTRAP_ADMIN && update.active == Some(false) {
            return Err(DashboardError::ProtectedAccount(
                "Cannot deactivate admin account".to_string(),
            ));
        }
        if matches!(update.password.as_deref(), Some("")) {
            return Err(DashboardError::Validation("Password cannot be empty".to_string()));
        }

        let salt = &self.settings.password_salt;
        let account = self
            .accounts
            .get_mut(username)
            .ok_or_else(|| DashboardError::AccountNotFound(username.to_string()))?;

        if let Some(password) = update.password {
            account.password_hash = hash_password(&password, salt);
        }
        if let Some(role) = update.role {
            account.role = role;
            if update.permissions.is_none() {
                account.permissions = role.default_permissions();
            }
        }
        if let Some(permissions) = update.permissions {
            account.permissions = permissions;
        }
        if let Some(active) = update.active {
            account.active = active;
        }
        let account = account.clone();
        info!("Updated account {}", username);

        self.save()?;
        Ok(account)
    }

    /// Mark an account inactive; it stays in the table but cannot log in
    pub fn deactivate_account(&mut self, username: &str) -> DashboardResult<()> {
        if username == BOOTSTRAP_ADMIN {
            return Err(DashboardError::ProtectedAccount(
                "Cannot deactivate admin account".to_string(),
            ));
        }
        self.set_active(username, false)
    }

    /// Mark an account active again
    pub fn activate_account(&mut self, username: &str) -> DashboardResult<()> {
        self.set_active(username, true)
    }

    fn set_active(&mut self, username: &str, active: bool) -> DashboardResult<()> {
        let account = self
            .accounts
            .get_mut(username)
            .ok_or_else(|| DashboardError::AccountNotFound(username.to_string()))?;
        account.active = active;
        info!(
            "{} account {}",
            if active { "Activated" } else { "Deactivated" },
            username
        );

        self.save()
    }

    /// Remove an account
    ///
    /// The admin account is protected and nobody may delete themselves; both
    /// rules are checked before existence.
    pub fn delete_account(&mut self, username: &str, requester: &str) -> DashboardResult<()> {
        if username == BOOTSTRAP_ADMIN {
            return Err(DashboardError::ProtectedAccount(
                "Cannot delete admin user".to_string(),
            ));
        }
        if username == requester {
            return Err(DashboardError::SelfDeletion);
        }
        if self.accounts.remove(username).is_none() {
            return Err(DashboardError::AccountNotFound(username.to_string()));
        }
        warn!("Deleted account {} by {}", username, requester);

        self.save()
    }

    /// Read-only view of every account
    pub fn list_accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn get_account(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    /// Permission lookup with the `all_sensors` escalation; unknown users have none
    pub fn has_permission(&self, username: &str, permission: Permission) -> bool {
        self.accounts
            .get(username)
            .map(|account| grants(&account.permissions, permission))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn save(&self) -> DashboardResult<()> {
        self.backend.save(&self.accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::MemoryBackend;

    fn settings() -> StoreSettings {
        StoreSettings {
            password_salt: "test_salt_value".to_string(),
            default_admin_password: "changeme".to_string(),
        }
    }

    fn open_store() -> (CredentialStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = CredentialStore::open(Box::new(backend.clone()), settings());
        (store, backend)
    }

    #[test]
    fn test_bootstrap_seeds_admin() {
        let (store, backend) = open_store();

        let admin = store.get_account(BOOTSTRAP_ADMIN).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.created_by, "system");
        assert_eq!(admin.permissions, Role::Admin.default_permissions());
        assert!(admin.active);
        assert!(backend.snapshot().unwrap().contains_key(BOOTSTRAP_ADMIN));
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let (mut store, backend) = open_store();
        store
            .create_account("alice", "pw1", Role::User, Role::User.default_permissions(), "admin")
            .unwrap();

        let mut reopened = CredentialStore::open(Box::new(backend.clone()), settings());
        assert_eq!(reopened.len(), 2);
        reopened.bootstrap().unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_unreadable_store_stays_empty() {
        let backend = MemoryBackend::new();
        backend.set_fail_reads(true);

        let mut store = CredentialStore::new(Box::new(backend.clone()), settings());
        assert!(matches!(store.bootstrap(), Err(DashboardError::StoreRead(_))));
        assert!(store.is_empty());
        assert!(store.authenticate(BOOTSTRAP_ADMIN, "changeme").is_none());
        assert!(backend.snapshot().is_none(), "must not overwrite");
    }

    #[test]
    fn test_authenticate_records_login() {
        let (mut store, backend) = open_store();
        let before = Utc::now();

        let account = store.authenticate(BOOTSTRAP_ADMIN, "changeme").unwrap();
        assert!(account.last_login.unwrap() >= before);

        let saved = backend.snapshot().unwrap();
        assert_eq!(saved[BOOTSTRAP_ADMIN].last_login, account.last_login);
    }

    #[test]
    fn test_authenticate_rejections() {
        let (mut store, _) = open_store();
        store
            .create_account("bob", "secret", Role::Viewer, Role::Viewer.default_permissions(), "admin")
            .unwrap();

        assert!(store.authenticate("bob", "wrong").is_none());
        assert!(store.authenticate("nobody", "secret").is_none());

        store.deactivate_account("bob").unwrap();
        assert!(store.authenticate("bob", "secret").is_none());

        store.activate_account("bob").unwrap();
        assert!(store.authenticate("bob", "secret").is_some());
    }

    #[test]
    fn test_login_survives_write_failure() {
        let (mut store, backend) = open_store();
        backend.set_fail_writes(true);
        assert!(store.authenticate(BOOTSTRAP_ADMIN, "changeme").is_some());
    }

    #[test]
    fn test_create_rejects_duplicates_and_blanks() {
        let (mut store, _) = open_store();
        let perms = Role::User.default_permissions();

        assert!(matches!(
            store.create_account("admin", "x", Role::User, perms.clone(), "admin"),
            Err(DashboardError::DuplicateAccount(_))
        ));
        assert!(matches!(
            store.create_account("  ", "x", Role::User, perms.clone(), "admin"),
            Err(DashboardError::Validation(_))
        ));
        assert!(matches!(
            store.create_account("carol", "", Role::User, perms, "admin"),
            Err(DashboardError::Validation(_))
        ));
    }

    #[test]
    fn test_update_account() {
        let (mut store, _) = open_store();
        store
            .create_account("dave", "old", Role::Viewer, Role::Viewer.default_permissions(), "admin")
            .unwrap();

        let updated = store
            .update_account(
                "dave",
                AccountUpdate {
                    password: Some("new".to_string()),
                    role: Some(Role::User),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.permissions, Role::User.default_permissions());
        assert_ne!(updated.password_hash, "new");
        assert!(store.authenticate("dave", "new").is_some());

        let explicit: PermissionSet = [Permission::Dashboard].into_iter().collect();
        let updated = store
            .update_account(
                "dave",
                AccountUpdate {
                    role: Some(Role::Admin),
                    permissions: Some(explicit.clone()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.permissions, explicit);

        assert!(matches!(
            store.update_account("ghost", AccountUpdate::default()),
            Err(DashboardError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_admin_cannot_be_deactivated() {
        let (mut store, _) = open_store();

        assert!(matches!(
            store.deactivate_account(BOOTSTRAP_ADMIN),
            Err(DashboardError::ProtectedAccount(_))
        ));
        assert!(matches!(
            store.update_account(
                BOOTSTRAP_ADMIN,
                AccountUpdate {
                    active: Some(false),
                    ..Default::default()
                }
            ),
            Err(DashboardError::ProtectedAccount(_))
        ));
        assert!(store.get_account(BOOTSTRAP_ADMIN).unwrap().active);
    }

    #[test]
    fn test_delete_rules() {
        let (mut store, _) = open_store();
        store
            .create_account("erin", "pw", Role::User, Role::User.default_permissions(), "admin")
            .unwrap();

        assert!(matches!(
            store.delete_account(BOOTSTRAP_ADMIN, BOOTSTRAP_ADMIN),
            Err(DashboardError::ProtectedAccount(_))
        ));
        assert!(matches!(
            store.delete_account("erin", "erin"),
            Err(DashboardError::SelfDeletion)
        ));
        assert!(matches!(
            store.delete_account("ghost", "admin"),
            Err(DashboardError::AccountNotFound(_))
        ));

        store.delete_account("erin", "admin").unwrap();
        assert!(store.get_account("erin").is_none());
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let (mut store, backend) = open_store();
        backend.set_fail_writes(true);

        let result = store.create_account(
            "frank",
            "pw",
            Role::Viewer,
            Role::Viewer.default_permissions(),
            "admin",
        );
        assert!(matches!(result, Err(DashboardError::StoreWrite(_))));
        assert!(store.get_account("frank").is_some());
        assert!(!backend.snapshot().unwrap().contains_key("frank"));
    }

    #[test]
    fn test_has_permission() {
        let (mut store, _) = open_store();
        store
            .create_account(
                "gina",
                "pw",
                Role::Viewer,
                [Permission::Dashboard].into_iter().collect(),
                "admin",
            )
            .unwrap();

        assert!(store.has_permission("gina", Permission::Dashboard));
        assert!(!store.has_permission("gina", Permission::Sensors));
        assert!(!store.has_permission("nobody", Permission::Dashboard));
    }
}
