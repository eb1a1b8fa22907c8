/// Application context and dependency injection
use crate::{
    account::{AccountBackend, CredentialStore, JsonFileBackend, StoreSettings},
    audit::AuditLog,
    config::DashboardConfig,
    error::{DashboardError, DashboardResult},
    feeds::{CachedProvider, FeedProvider, InfluxProvider},
    freshness::FreshnessEvaluator,
    rate_limit::RateLimiter,
    sensors::SensorThresholds,
    session::{LoginThrottle, SessionRegistry},
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DashboardConfig>,
    /// One request at a time mutates the account table
    pub credential_store: Arc<Mutex<CredentialStore>>,
    pub sessions: Arc<SessionRegistry>,
    pub login_throttle: Arc<LoginThrottle>,
    pub feed_provider: Arc<dyn FeedProvider>,
    pub freshness: Arc<FreshnessEvaluator>,
    pub thresholds: SensorThresholds,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit: AuditLog,
}

impl AppContext {
    /// Create the application context from configuration
    pub fn new(config: DashboardConfig) -> DashboardResult<Self> {
        for warning in config.validate()? {
            warn!("Configuration: {}", warning);
        }

        let backend = JsonFileBackend::new(config.storage.users_file.clone());
        info!("Account store: {}", backend.path().display());

        let provider = CachedProvider::new(
            Arc::new(InfluxProvider::new(&config.influx)?),
            Duration::from_secs(config.influx.cache_ttl),
        );

        Ok(Self::with_parts(config, Box::new(backend), Arc::new(provider)))
    }

    /// Assemble a context around an explicit account backend and feed provider
    pub fn with_parts(
        config: DashboardConfig,
        backend: Box<dyn AccountBackend>,
        feed_provider: Arc<dyn FeedProvider>,
    ) -> Self {
        let auth = &config.authentication;
        let credential_store = CredentialStore::open(backend, StoreSettings::from(auth));
        let sessions = SessionRegistry::new(Duration::from_secs(auth.session_timeout));
        let login_throttle = LoginThrottle::new(
            auth.max_failed_attempts,
            Duration::from_secs(auth.lockout_duration),
        );

        Self {
            credential_store: Arc::new(Mutex::new(credential_store)),
            sessions: Arc::new(sessions),
            login_throttle: Arc::new(login_throttle),
            feed_provider,
            freshness: Arc::new(FreshnessEvaluator::from_config(&config.freshness)),
            thresholds: SensorThresholds::default(),
            rate_limiter: Arc::new(RateLimiter::from_config(&config.security)),
            audit: AuditLog::new(config.security.audit_log),
            config: Arc::new(config),
        }
    }

    /// Exclusive access to the credential store
    ///
    /// Never hold the guard across an `.await`.
    pub fn store(&self) -> DashboardResult<MutexGuard<'_, CredentialStore>> {
        self.credential_store
            .lock()
            .map_err(|e| DashboardError::Internal(format!("Credential store poisoned: {}", e)))
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
