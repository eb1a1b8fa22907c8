/// Request rate limiting
///
/// Each client address gets its own requests-per-minute budget. The
/// liveness check is never limited.
use crate::{
    config::SecurityConfig,
    error::{DashboardError, DashboardResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};
use tracing::debug;

/// Paths exempt from limiting
const UNLIMITED_PATHS: [&str; 1] = ["/health"];

/// Client count above which idle client state is dropped
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Per-client requests-per-minute limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Option<Arc<DefaultKeyedRateLimiter<IpAddr>>>,
    per_minute: u32,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Some(Arc::new(GovernorLimiter::keyed(Quota::per_minute(per_minute)))),
            per_minute: per_minute.get(),
        }
    }

    /// Limiter that lets everything through
    pub fn disabled() -> Self {
        Self {
            limiter: None,
            per_minute: 0,
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        if config.rate_limiting {
            Self::new(config.max_requests_per_minute)
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Take one request from `client`'s quota
    pub fn check(&self, client: IpAddr) -> DashboardResult<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        let result = limiter
            .check_key(&client)
            .map_err(|_| DashboardError::RateLimitExceeded);

        if limiter.len() > MAX_TRACKED_CLIENTS {
            limiter.retain_recent();
            limiter.shrink_to_fit();
            debug!("Rate limiter now tracks {} clients", limiter.len());
        }

        result
    }

    /// Clients with live rate-limit state
    pub fn tracked_clients(&self) -> usize {
        self.limiter.as_ref().map_or(0, |limiter| limiter.len())
    }
}

/// Peer address recorded by the server, or the unspecified address when absent
pub fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, DashboardError> {
    if UNLIMITED_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    ctx.rate_limiter.check(client_ip(&request))?;

    let mut response = next.run(request).await;
    if ctx.rate_limiter.is_enabled() {
        response
            .headers_mut()
            .insert("X-RateLimit-Limit", ctx.rate_limiter.per_minute.into());
    }
    Ok(response)
}
