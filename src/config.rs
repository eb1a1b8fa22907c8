/// Configuration management for the campus dashboard
use crate::error::{DashboardError, DashboardResult};
use crate::feeds::TimeRange;
use chrono::FixedOffset;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Password shipped as the bootstrap default; flagged by `validate`
pub const FACTORY_ADMIN_PASSWORD: &str = "cisco1234";

/// Main dashboard configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub freshness: FreshnessConfig,
    pub influx: InfluxConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub title: String,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Account file, rewritten wholesale on every mutation
    pub users_file: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub default_admin_password: String,
    /// Process-wide salt. Changing it invalidates every stored hash.
    pub password_salt: String,
    /// Idle seconds before a session is dropped
    pub session_timeout: u64,
    pub max_failed_attempts: u32,
    /// Seconds a username stays locked after too many failures
    pub lockout_duration: u64,
}

/// Data freshness configuration
#[derive(Debug, Clone)]
pub struct FreshnessConfig {
    /// Maximum age in seconds of the newest observation for data to count as live
    pub threshold_secs: u64,
    /// Campus civil time
    pub campus_offset: FixedOffset,
    pub default_time_range: TimeRange,
}

/// Time-series database configuration
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Seconds a successful feed query is reused; zero disables caching
    pub cache_ttl: u64,
}

/// Request security configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub rate_limiting: bool,
    pub max_requests_per_minute: u32,
    pub audit_log: bool,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None).expect("defaults always parse")
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> DashboardResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> DashboardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parse_or = |key: &str, default: u64| -> u64 {
            lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };
        let parse_u32_or = |key: &str, default: u32| -> u32 {
            lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };
        let flag = |key: &str, default: bool| -> bool {
            lookup(key)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        let hostname = get("DASHBOARD_HOST", "0.0.0.0");
        let port = get("DASHBOARD_PORT", "8501")
            .parse()
            .map_err(|_| DashboardError::Validation("Invalid port number".to_string()))?;
        let title = get("DASHBOARD_TITLE", "Smart Campus Dashboard");

        let users_file: PathBuf = get("DASHBOARD_USERS_FILE", "./data/users.json").into();

        let campus_offset = parse_utc_offset(&get("DASHBOARD_CAMPUS_UTC_OFFSET", "+03:00"))?;
        let default_time_range = get("DASHBOARD_DEFAULT_TIME_RANGE", "-24h")
            .parse()
            .unwrap_or_default();

        Ok(DashboardConfig {
            service: ServiceConfig {
                hostname,
                port,
                title,
            },
            storage: StorageConfig { users_file },
            authentication: AuthConfig {
                default_admin_password: get(
                    "DASHBOARD_DEFAULT_ADMIN_PASSWORD",
                    FACTORY_ADMIN_PASSWORD,
                ),
                password_salt: get("DASHBOARD_PASSWORD_SALT", "smart_campus_salt"),
                session_timeout: parse_or("DASHBOARD_SESSION_TIMEOUT", 3600),
                max_failed_attempts: parse_u32_or("DASHBOARD_MAX_FAILED_ATTEMPTS", 5),
                lockout_duration: parse_or("DASHBOARD_LOCKOUT_DURATION", 300),
            },
            freshness: FreshnessConfig {
                threshold_secs: parse_or("DASHBOARD_FRESHNESS_THRESHOLD", 600),
                campus_offset,
                default_time_range,
            },
            influx: InfluxConfig {
                url: get("INFLUX_URL", "http://localhost:8086"),
                token: get("INFLUX_TOKEN", ""),
                org: get("INFLUX_ORG", "campus"),
                bucket: get("INFLUX_BUCKET", "sensor-data"),
                timeout: parse_or("INFLUX_TIMEOUT", 30),
                cache_ttl: parse_or("INFLUX_CACHE_TTL", 30),
            },
            security: SecurityConfig {
                rate_limiting: flag("DASHBOARD_RATE_LIMITING", true),
                max_requests_per_minute: parse_u32_or("DASHBOARD_MAX_REQUESTS_PER_MINUTE", 60),
                audit_log: flag("DASHBOARD_AUDIT_LOG", true),
            },
            logging: LoggingConfig {
                level: get("DASHBOARD_LOG_LEVEL", "campus_dashboard=info,tower_http=info"),
                json: flag("DASHBOARD_LOG_JSON", false),
            },
        })
    }

    /// Validate configuration, returning non-fatal warnings
    pub fn validate(&self) -> DashboardResult<Vec<String>> {
        if self.influx.url.is_empty() {
            return Err(DashboardError::Validation("InfluxDB URL is required".to_string()));
        }
        if self.influx.token.is_empty() {
            return Err(DashboardError::Validation(
                "InfluxDB token is required".to_string(),
            ));
        }
        if self.freshness.threshold_secs == 0 {
            return Err(DashboardError::Validation(
                "Freshness threshold must be positive".to_string(),
            ));
        }

        let users_file = &self.storage.users_file;
        if users_file.exists()
            && OpenOptions::new()
                .read(true)
                .write(true)
                .open(users_file)
                .is_err()
        {
            return Err(DashboardError::Validation(format!(
                "No read/write access to users file: {}",
                users_file.display()
            )));
        }

        let mut warnings = Vec::new();
        if self.authentication.password_salt.len() < 8 {
            warnings.push("Password salt should be at least 8 characters long".to_string());
        }
        if self.authentication.default_admin_password == FACTORY_ADMIN_PASSWORD {
            warnings.push(
                "Default admin password is the factory value; set DASHBOARD_DEFAULT_ADMIN_PASSWORD"
                    .to_string(),
            );
        }

        Ok(warnings)
    }
}

/// Parse `+HH:MM`, `-HH:MM` or `+HH` into a fixed offset
fn parse_utc_offset(value: &str) -> DashboardResult<FixedOffset> {
    let invalid = || DashboardError::Validation(format!("Invalid UTC offset: {}", value));
    let value = value.trim();

    let (sign, rest) = match value.chars().next() {
        Some('+') => (1, &value[1..]),
        Some('-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
