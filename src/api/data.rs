/// Sensor data endpoints
///
/// `/api/data/status` gathers all feeds for a window, evaluates freshness and
/// the live sensor status. The security feed is only included for sessions
/// holding the `sensors` permission.
use crate::{
    account::Permission,
    auth::SessionAuth,
    context::AppContext,
    error::DashboardResult,
    feeds::{FeedResult, SensorFeed, TimeRange},
    freshness::{Freshness, HealthLevel},
    sensors::{calibrate_dht11, CalibratedReading, LiveStatus},
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build sensor data routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/data/status", get(data_status))
        .route("/api/sensors/calibrate", post(calibrate))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Relative range such as `-1h`; defaults to the configured window
    pub range: Option<String>,
}

/// Per-feed results
#[derive(Debug, Serialize)]
pub struct FeedSet {
    pub environment: FeedResult,
    pub classroom: FeedResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<FeedResult>,
}

#[derive(Debug, Serialize)]
pub struct DataStatus {
    pub range: String,
    pub freshness: Freshness,
    pub health: HealthLevel,
    pub live: LiveStatus,
    pub feeds: FeedSet,
}

#[derive(Debug, Deserialize)]
pub struct CalibrateRequest {
    pub raw_temperature: f64,
    pub raw_humidity: f64,
}

/// Latest readings, freshness banner and feed data for a window
async fn data_status(
    State(ctx): State<AppContext>,
    auth: SessionAuth,
    Query(query): Query<StatusQuery>,
) -> DashboardResult<Json<DataStatus>> {
    auth.require(&ctx, Permission::Dashboard)?;

    let range = match query.range.as_deref() {
        Some(range) => range.parse::<TimeRange>()?,
        None => ctx.config.freshness.default_time_range,
    };

    let feeds = ctx.feed_provider.fetch_all(range).await;
    let freshness = ctx.freshness.check(&feeds);

    let mut feeds = feeds.into_iter();
    let environment = feeds
        .next()
        .unwrap_or_else(|| FeedResult::ok(SensorFeed::Environment, Vec::new()));
    let classroom = feeds
        .next()
        .unwrap_or_else(|| FeedResult::ok(SensorFeed::Classroom, Vec::new()));
    let security = feeds
        .next()
        .filter(|_| auth.session.check_permission(Permission::Sensors));

    let live = LiveStatus::from_feeds(
        &environment,
        &classroom,
        security.as_ref(),
        &ctx.thresholds,
    );

    tracing::debug!(
        user = auth.username(),
        range = %range,
        fresh = freshness.is_fresh,
        "data status served"
    );

    Ok(Json(DataStatus {
        range: range.to_string(),
        health: freshness.health(),
        freshness,
        live,
        feeds: FeedSet {
            environment,
            classroom,
            security,
        },
    }))
}

/// Apply DHT11 calibration to raw readings
async fn calibrate(
    State(ctx): State<AppContext>,
    auth: SessionAuth,
    Json(req): Json<CalibrateRequest>,
) -> DashboardResult<Json<CalibratedReading>> {
    auth.require(&ctx, Permission::Dashboard)?;
    Ok(Json(calibrate_dht11(req.raw_temperature, req.raw_humidity)?))
}
