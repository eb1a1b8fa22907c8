/// Health check endpoints
///
/// `/health` is a plain liveness check. `/health/data` reports database
/// reachability, data freshness and session load, with an overall level
/// equal to the worst component.
use crate::{context::AppContext, feeds::TimeRange, freshness::HealthLevel};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Database answers slower than this count as a warning
const SLOW_DATABASE: Duration = Duration::from_secs(5);

/// Health status response
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthLevel,
    pub version: String,
    pub checks: Vec<ComponentHealth>,
}

/// Health of one component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthLevel,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/data", get(health_data))
}

/// Liveness check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Detailed data-path health
pub async fn health_data(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let checks = vec![
        check_database(&ctx).await,
        check_data_freshness(&ctx).await,
        check_sessions(&ctx),
    ];

    let overall = checks
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(HealthLevel::Healthy);

    tracing::info!(status = ?overall, "health_check_completed");

    let status_code = match overall {
        HealthLevel::Critical => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        status_code,
        Json(HealthStatus {
            status: overall,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }),
    )
}

async fn check_database(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();
    let result = ctx.feed_provider.ping().await;
    let elapsed = start.elapsed();

    let (status, message) = match result {
        Ok(()) if elapsed > SLOW_DATABASE => (
            HealthLevel::Warning,
            format!("Database responding slowly ({:.2}s)", elapsed.as_secs_f64()),
        ),
        Ok(()) => (
            HealthLevel::Healthy,
            "Database connection successful".to_string(),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            (
                HealthLevel::Critical,
                "Database connection failed".to_string(),
            )
        }
    };

    ComponentHealth {
        name: "database".to_string(),
        status,
        message,
        response_time_ms: Some(elapsed.as_millis() as u64),
        details: None,
    }
}

async fn check_data_freshness(ctx: &AppContext) -> ComponentHealth {
    let feeds = ctx.feed_provider.fetch_all(TimeRange::LastHour).await;
    let freshness = ctx.freshness.check(&feeds);
    let status = freshness.health();

    let message = match status {
        HealthLevel::Healthy => "Data is fresh and up-to-date",
        HealthLevel::Warning => "Data is stale - showing historical data",
        HealthLevel::Critical => "No recent data available",
    };

    ComponentHealth {
        name: "data_freshness".to_string(),
        status,
        message: message.to_string(),
        response_time_ms: None,
        details: Some(serde_json::json!({ "freshness_message": freshness.message })),
    }
}

fn check_sessions(ctx: &AppContext) -> ComponentHealth {
    let expired = ctx.sessions.purge_expired().unwrap_or(0);
    let throttled = ctx.login_throttle.purge_expired();

    ComponentHealth {
        name: "sessions".to_string(),
        status: HealthLevel::Healthy,
        message: format!("{} active sessions", ctx.sessions.len()),
        response_time_ms: None,
        details: Some(serde_json::json!({
            "expired_purged": expired,
            "throttle_entries_purged": throttled,
            "throttled_usernames": ctx.login_throttle.len(),
        })),
    }
}
