/// Threshold-based sensor status and alerts
use crate::feeds::{FeedResult, FieldValue};
use serde::{Deserialize, Serialize};

/// Status of one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Good,
    Warning,
    Danger,
    Unknown,
}

/// Inclusive value range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Good band nested inside a wider warning band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub good: Band,
    pub warning: Band,
}

/// Thresholds for every monitored reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorThresholds {
    pub temperature: Thresholds,
    pub humidity: Thresholds,
    pub light: Thresholds,
}

impl Default for SensorThresholds {
    fn default() -> Self {
        Self {
            temperature: Thresholds {
                good: Band::new(22.0, 28.0),
                warning: Band::new(20.0, 32.0),
            },
            humidity: Thresholds {
                good: Band::new(40.0, 75.0),
                warning: Band::new(30.0, 85.0),
            },
            light: Thresholds {
                good: Band::new(200.0, 800.0),
                warning: Band::new(100.0, 1000.0),
            },
        }
    }
}

/// Classify a reading against its thresholds
pub fn evaluate_status(value: Option<f64>, thresholds: &Thresholds) -> SensorStatus {
    match value {
        None => SensorStatus::Unknown,
        Some(v) if v.is_nan() => SensorStatus::Unknown,
        Some(v) if thresholds.good.contains(v) => SensorStatus::Good,
        Some(v) if thresholds.warning.contains(v) => SensorStatus::Warning,
        Some(_) => SensorStatus::Danger,
    }
}

/// A reading and its classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub value: Option<f64>,
    pub status: SensorStatus,
}

impl Reading {
    fn evaluate(value: Option<f64>, thresholds: &Thresholds) -> Self {
        Self {
            value,
            status: evaluate_status(value, thresholds),
        }
    }
}

/// Current readings with their status, plus alerts for dangerous values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStatus {
    pub temperature: Reading,
    pub humidity: Reading,
    pub light: Reading,
    /// `None` when the security feed is not visible or empty
    pub motion_detected: Option<bool>,
    pub access_granted: Option<bool>,
    pub alerts: Vec<String>,
}

impl LiveStatus {
    pub fn from_feeds(
        environment: &FeedResult,
        classroom: &FeedResult,
        security: Option<&FeedResult>,
        thresholds: &SensorThresholds,
    ) -> Self {
        let temperature = Reading::evaluate(
            environment.latest_number("temperature"),
            &thresholds.temperature,
        );
        let humidity =
            Reading::evaluate(environment.latest_number("humidity"), &thresholds.humidity);
        let light = Reading::evaluate(classroom.latest_number("light_level"), &thresholds.light);

        let mut alerts = Vec::new();
        if temperature.status == SensorStatus::Danger {
            alerts.push("🌡️ Temperature is outside safe range!".to_string());
        }
        if humidity.status == SensorStatus::Danger {
            alerts.push("💧 Humidity levels are concerning!".to_string());
        }
        if light.status == SensorStatus::Danger {
            alerts.push("💡 Light levels need attention!".to_string());
        }

        Self {
            temperature,
            humidity,
            light,
            motion_detected: security
                .filter(|feed| !feed.is_empty())
                .map(|feed| latest_flag(feed, "motion_detected").unwrap_or(false)),
            access_granted: security.and_then(|feed| latest_flag(feed, "access_status")),
            alerts,
        }
    }
}

/// Truthiness of a field in the newest record
fn latest_flag(feed: &FeedResult, field: &str) -> Option<bool> {
    let latest = feed.usable_records().last()?;
    match latest.values.get(field) {
        Some(FieldValue::Bool(b)) => Some(*b),
        Some(FieldValue::Number(n)) => Some(*n != 0.0),
        Some(FieldValue::Text(s)) => Some(matches!(s.as_str(), "true" | "True" | "granted")),
        None => None,
    }
}
