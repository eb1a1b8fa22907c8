/// Freshness evaluation across the three sensor feeds
use campus_dashboard::{
    feeds::{FeedResult, FeedTimestamp, FieldValue, Observation, SensorFeed},
    freshness::{FreshnessEvaluator, HealthLevel},
};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};

fn campus_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap()
}

fn evaluator() -> FreshnessEvaluator {
    FreshnessEvaluator::new(600, campus_offset())
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap()
}

fn observed(at: DateTime<Utc>) -> Observation {
    Observation::new(Some(FeedTimestamp::Aware(at.fixed_offset())))
        .with("temperature", FieldValue::Number(24.0))
}

/// Newest observation `age_secs` old sits in the classroom feed; the others are older
fn feeds_with_latest(age_secs: i64) -> Vec<FeedResult> {
    let latest = now() - Duration::seconds(age_secs);
    vec![
        FeedResult::ok(
            SensorFeed::Environment,
            vec![observed(latest - Duration::minutes(30))],
        ),
        FeedResult::ok(
            SensorFeed::Classroom,
            vec![
                observed(latest - Duration::minutes(5)),
                observed(latest),
            ],
        ),
        FeedResult::ok(
            SensorFeed::Security,
            vec![observed(latest - Duration::hours(2))],
        ),
    ]
}

#[test]
fn test_599_seconds_is_fresh() {
    let result = evaluator().check_at(&feeds_with_latest(599), now());
    assert!(result.is_fresh);
    assert_eq!(result.health(), HealthLevel::Healthy);
}

#[test]
fn test_exactly_threshold_is_fresh() {
    let result = evaluator().check_at(&feeds_with_latest(600), now());
    assert!(result.is_fresh);
}

#[test]
fn test_601_seconds_is_stale() {
    let result = evaluator().check_at(&feeds_with_latest(601), now());
    assert!(!result.is_fresh);
    assert_eq!(result.health(), HealthLevel::Warning);
    assert!(result.message.starts_with("Last update: "));
    assert!(result.message.ends_with("(10.0 min ago) - Showing 24hr history"));
}

#[test]
fn test_sub_millisecond_past_threshold_is_stale() {
    let latest = now() - Duration::microseconds(600_000_400);
    let feeds = vec![FeedResult::ok(SensorFeed::Environment, vec![observed(latest)])];

    let result = evaluator().check_at(&feeds, now());
    assert!(!result.is_fresh);
    assert!(result.message.ends_with("(10.0 min ago) - Showing 24hr history"));
}

#[test]
fn test_future_timestamp_is_fresh() {
    let latest = now() + Duration::seconds(5);
    let feeds = vec![FeedResult::ok(SensorFeed::Classroom, vec![observed(latest)])];

    assert!(evaluator().check_at(&feeds, now()).is_fresh);
}

#[test]
fn test_live_message_uses_campus_clock() {
    // 09:00 UTC minus one minute is 11:59:00 at UTC+3
    let result = evaluator().check_at(&feeds_with_latest(60), now());
    assert_eq!(result.message, "Live data (last update: 11:59:00)");
    assert_eq!(result.latest.unwrap().offset(), &campus_offset());
}

#[test]
fn test_all_feeds_empty_reports_no_data() {
    let feeds = vec![
        FeedResult::ok(SensorFeed::Environment, Vec::new()),
        FeedResult::ok(SensorFeed::Classroom, Vec::new()),
        FeedResult::ok(SensorFeed::Security, Vec::new()),
    ];

    let result = evaluator().check_at(&feeds, now());
    assert!(!result.is_fresh);
    assert_eq!(result.message, "No data available");
    assert_eq!(result.health(), HealthLevel::Critical);
}

#[test]
fn test_failed_feeds_count_as_empty() {
    let feeds = vec![
        FeedResult::failed(SensorFeed::Environment, "Database query error"),
        FeedResult::failed(SensorFeed::Classroom, "Database query error"),
        FeedResult::ok(SensorFeed::Security, Vec::new()),
    ];

    let result = evaluator().check_at(&feeds, now());
    assert_eq!(result.message, "No data available");
}

#[test]
fn test_records_without_timestamps() {
    let feeds = vec![FeedResult::ok(
        SensorFeed::Environment,
        vec![Observation::new(None).with("humidity", FieldValue::Number(50.0))],
    )];

    let result = evaluator().check_at(&feeds, now());
    assert!(!result.is_fresh);
    assert_eq!(result.message, "No valid timestamps found");
}

#[test]
fn test_naive_timestamps_are_utc() {
    let latest = (now() - Duration::seconds(30)).naive_utc();
    let feeds = vec![FeedResult::ok(
        SensorFeed::Security,
        vec![Observation::new(Some(FeedTimestamp::Naive(latest)))],
    )];

    let result = evaluator().check_at(&feeds, now());
    assert!(result.is_fresh);
    assert_eq!(result.age_seconds, Some(30.0));
}
