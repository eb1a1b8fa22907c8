/// Persistence backends for the account table
use crate::{
    account::Account,
    error::{DashboardError, DashboardResult},
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Whole account table, keyed by username
pub type Accounts = BTreeMap<String, Account>;

/// Account table storage
///
/// The table is always loaded and saved wholesale.
pub trait AccountBackend: Send + Sync {
    /// Load the table; `None` when nothing has been stored yet
    fn load(&self) -> DashboardResult<Option<Accounts>>;

    /// Replace the stored table
    fn save(&self, accounts: &Accounts) -> DashboardResult<()>;
}

/// JSON file backend
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so a reader never sees a half-written table.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "users.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl AccountBackend for JsonFileBackend {
    fn load(&self) -> DashboardResult<Option<Accounts>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DashboardError::StoreRead(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut accounts: Accounts = serde_json::from_str(&contents).map_err(|e| {
            DashboardError::StoreRead(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;

        // The map key is authoritative
        for (username, account) in accounts.iter_mut() {
            account.username = username.clone();
        }

        Ok(Some(accounts))
    }

    fn save(&self, accounts: &Accounts) -> DashboardResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                DashboardError::StoreWrite(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_string_pretty(accounts)
            .map_err(|e| DashboardError::StoreWrite(format!("Failed to encode accounts: {}", e)))?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, json).map_err(|e| {
            DashboardError::StoreWrite(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            DashboardError::StoreWrite(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

/// In-process backend
///
/// Clones share the same table, so tests can inspect what the store saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    accounts: Arc<Mutex<Option<Accounts>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing table
    pub fn with_accounts(accounts: Accounts) -> Self {
        let backend = Self::default();
        *backend.lock() = Some(accounts);
        backend
    }

    /// Make every subsequent load fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent save fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Last saved table
    pub fn snapshot(&self) -> Option<Accounts> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Accounts>> {
        self.accounts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AccountBackend for MemoryBackend {
    fn load(&self) -> DashboardResult<Option<Accounts>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DashboardError::StoreRead("simulated read failure".to_string()));
        }
        Ok(self.lock().clone())
    }

    fn save(&self, accounts: &Accounts) -> DashboardResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DashboardError::StoreWrite("simulated write failure".to_string()));
        }
        *self.lock() = Some(accounts.clone());
        Ok(())
    }
}
