/// Data freshness evaluation
///
/// Decides whether the newest observation across all feeds is recent enough
/// to call the dashboard "live", and builds the banner message.
use crate::{config::FreshnessConfig, feeds::FeedResult};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::time::Duration;

/// Health level reported by the health endpoints, mildest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

/// Freshness verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Freshness {
    pub is_fresh: bool,
    pub message: String,
    /// Newest observation, in campus time
    pub latest: Option<DateTime<FixedOffset>>,
    pub age_seconds: Option<f64>,
}

impl Freshness {
    fn unavailable(message: &str) -> Self {
        Self {
            is_fresh: false,
            message: message.to_string(),
            latest: None,
            age_seconds: None,
        }
    }

    /// Fresh is healthy, stale is a warning, no data at all is critical
    pub fn health(&self) -> HealthLevel {
        match (self.is_fresh, self.latest) {
            (true, _) => HealthLevel::Healthy,
            (false, Some(_)) => HealthLevel::Warning,
            (false, None) => HealthLevel::Critical,
        }
    }
}

/// Freshness evaluator
///
/// Pure apart from reading the clock in `check`; use `check_at` to pin time.
#[derive(Debug, Clone)]
pub struct FreshnessEvaluator {
    threshold_secs: u64,
    campus_offset: FixedOffset,
}

impl FreshnessEvaluator {
    pub fn new(threshold_secs: u64, campus_offset: FixedOffset) -> Self {
        Self {
            threshold_secs,
            campus_offset,
        }
    }

    pub fn from_config(config: &FreshnessConfig) -> Self {
        Self::new(config.threshold_secs, config.campus_offset)
    }

    pub fn threshold_secs(&self) -> u64 {
        self.threshold_secs
    }

    pub fn check(&self, feeds: &[FeedResult]) -> Freshness {
        self.check_at(feeds, Utc::now())
    }

    /// Evaluate against a given "now"
    ///
    /// Data exactly `threshold` seconds old is still fresh.
    pub fn check_at(&self, feeds: &[FeedResult], now: DateTime<Utc>) -> Freshness {
        if feeds.iter().all(FeedResult::is_empty) {
            return Freshness::unavailable("No data available");
        }

        let Some(latest) = feeds.iter().filter_map(FeedResult::latest_time).max() else {
            return Freshness::unavailable("No valid timestamps found");
        };

        let latest_local = latest.with_timezone(&self.campus_offset);
        let age = now - latest;
        let age_seconds = age.num_milliseconds() as f64 / 1000.0;
        let clock = latest_local.format("%H:%M:%S");

        // Future timestamps fail `to_std` and count as fresh
        let stale = age
            .to_std()
            .is_ok_and(|age| age > Duration::from_secs(self.threshold_secs));

        if stale {
            Freshness {
                is_fresh: false,
                message: format!(
                    "Last update: {} ({:.1} min ago) - Showing 24hr history",
                    clock,
                    age_seconds / 60.0
                ),
                latest: Some(latest_local),
                age_seconds: Some(age_seconds),
            }
        } else {
            Freshness {
                is_fresh: true,
                message: format!("Live data (last update: {})", clock),
                latest: Some(latest_local),
                age_seconds: Some(age_seconds),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{FeedTimestamp, Observation, SensorFeed};
    use chrono::{Duration, TimeZone};

    fn eat() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn feed_at(feed: SensorFeed, time: DateTime<Utc>) -> FeedResult {
        FeedResult::ok(
            feed,
            vec![Observation::new(Some(FeedTimestamp::Naive(time.naive_utc())))],
        )
    }

    #[test]
    fn test_fresh_message_uses_campus_time() {
        let evaluator = FreshnessEvaluator::new(600, eat());
        let feeds = vec![feed_at(SensorFeed::Environment, now() - Duration::seconds(60))];

        let result = evaluator.check_at(&feeds, now());
        assert!(result.is_fresh);
        assert_eq!(result.message, "Live data (last update: 12:29:00)");
        assert_eq!(result.health(), HealthLevel::Healthy);
    }

    #[test]
    fn test_stale_message() {
        let evaluator = FreshnessEvaluator::new(600, eat());
        let feeds = vec![feed_at(SensorFeed::Classroom, now() - Duration::seconds(45 * 60))];

        let result = evaluator.check_at(&feeds, now());
        assert!(!result.is_fresh);
        assert_eq!(
            result.message,
            "Last update: 11:45:00 (45.0 min ago) - Showing 24hr history"
        );
        assert_eq!(result.health(), HealthLevel::Warning);
    }

    #[test]
    fn test_newest_feed_wins() {
        let evaluator = FreshnessEvaluator::new(600, eat());
        let feeds = vec![
            feed_at(SensorFeed::Environment, now() - Duration::hours(3)),
            feed_at(SensorFeed::Classroom, now() - Duration::seconds(30)),
            FeedResult::failed(SensorFeed::Security, "No data available for security"),
        ];
        assert!(evaluator.check_at(&feeds, now()).is_fresh);
    }

    #[test]
    fn test_no_timestamps() {
        let evaluator = FreshnessEvaluator::new(600, eat());
        let feeds = vec![FeedResult::ok(SensorFeed::Security, vec![Observation::new(None)])];

        let result = evaluator.check_at(&feeds, now());
        assert!(!result.is_fresh);
        assert_eq!(result.message, "No valid timestamps found");
        assert_eq!(result.health(), HealthLevel::Critical);
    }

    #[test]
    fn test_custom_threshold() {
        let evaluator = FreshnessEvaluator::new(60, eat());
        let feeds = vec![feed_at(SensorFeed::Environment, now() - Duration::seconds(61))];
        assert!(!evaluator.check_at(&feeds, now()).is_fresh);
    }
}
