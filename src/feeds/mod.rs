/// Sensor feeds from the external time-series database
///
/// Three independent feeds (environment, classroom, security), each a time
/// ordered list of observations. Providers never fail a fetch outright; a
/// failed or empty query comes back as a `FeedResult` carrying an error
/// string, and downstream code treats it as an empty feed.

mod cache;
mod influx;

pub use cache::CachedProvider;
pub use influx::InfluxProvider;

use crate::error::{DashboardError, DashboardResult};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sensor feed, one per measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorFeed {
    Environment,
    Classroom,
    Security,
}

impl SensorFeed {
    pub const ALL: [SensorFeed; 3] = [
        SensorFeed::Environment,
        SensorFeed::Classroom,
        SensorFeed::Security,
    ];

    /// Measurement name in the database
    pub fn measurement(&self) -> &'static str {
        match self {
            SensorFeed::Environment => "environment",
            SensorFeed::Classroom => "classroom",
            SensorFeed::Security => "security",
        }
    }
}

impl fmt::Display for SensorFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.measurement())
    }
}

/// Supported query windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeRange {
    Last15Minutes,
    LastHour,
    Last6Hours,
    #[default]
    Last24Hours,
    Last7Days,
}

impl TimeRange {
    /// Relative range start as the database expects it
    pub fn as_flux(&self) -> &'static str {
        match self {
            TimeRange::Last15Minutes => "-15m",
            TimeRange::LastHour => "-1h",
            TimeRange::Last6Hours => "-6h",
            TimeRange::Last24Hours => "-24h",
            TimeRange::Last7Days => "-7d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flux())
    }
}

impl FromStr for TimeRange {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "-15m" => Ok(TimeRange::Last15Minutes),
            "-1h" => Ok(TimeRange::LastHour),
            "-6h" => Ok(TimeRange::Last6Hours),
            "-24h" => Ok(TimeRange::Last24Hours),
            "-7d" => Ok(TimeRange::Last7Days),
            other => Err(DashboardError::Validation(format!(
                "Unsupported time range: {}",
                other
            ))),
        }
    }
}

/// Observation timestamp as delivered by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FeedTimestamp {
    Aware(DateTime<FixedOffset>),
    /// No zone information; taken to be UTC
    Naive(NaiveDateTime),
}

impl FeedTimestamp {
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            FeedTimestamp::Aware(dt) => dt.with_timezone(&Utc),
            FeedTimestamp::Naive(naive) => Utc.from_utc_datetime(naive),
        }
    }
}

/// Single field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One row of a feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub time: Option<FeedTimestamp>,
    pub values: BTreeMap<String, FieldValue>,
}

impl Observation {
    pub fn new(time: Option<FeedTimestamp>) -> Self {
        Self {
            time,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: FieldValue) -> Self {
        self.values.insert(field.to_string(), value);
        self
    }
}

/// Outcome of fetching one feed
#[derive(Debug, Clone, Serialize)]
pub struct FeedResult {
    pub feed: SensorFeed,
    pub records: Vec<Observation>,
    pub error: Option<String>,
}

impl FeedResult {
    pub fn ok(feed: SensorFeed, records: Vec<Observation>) -> Self {
        Self {
            feed,
            records,
            error: None,
        }
    }

    pub fn failed(feed: SensorFeed, error: impl Into<String>) -> Self {
        Self {
            feed,
            records: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Records, or nothing if the fetch errored
    pub fn usable_records(&self) -> &[Observation] {
        if self.error.is_some() {
            &[]
        } else {
            &self.records
        }
    }

    pub fn is_empty(&self) -> bool {
        self.usable_records().is_empty()
    }

    /// Newest timestamp in the feed, if any record has one
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.usable_records()
            .iter()
            .filter_map(|r| r.time.map(|t| t.to_utc()))
            .max()
    }

    /// Most recent numeric value of a field
    pub fn latest_number(&self, field: &str) -> Option<f64> {
        self.usable_records()
            .iter()
            .rev()
            .find_map(|r| r.values.get(field).and_then(FieldValue::as_f64))
    }
}

/// Source of sensor feeds
#[async_trait]
pub trait FeedProvider: Send + Sync {
    /// Fetch one feed; failures are reported in `FeedResult::error`
    async fn fetch(&self, feed: SensorFeed, range: TimeRange) -> FeedResult;

    /// Check that the database is reachable
    async fn ping(&self) -> DashboardResult<()>;

    /// Fetch every feed concurrently, in `SensorFeed::ALL` order
    async fn fetch_all(&self, range: TimeRange) -> Vec<FeedResult> {
        let (environment, classroom, security) = tokio::join!(
            self.fetch(SensorFeed::Environment, range),
            self.fetch(SensorFeed::Classroom, range),
            self.fetch(SensorFeed::Security, range),
        );
        vec![environment, classroom, security]
    }
}
