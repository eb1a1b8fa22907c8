/// Login, logout and session introspection
use crate::{
    account::{LoginRequest, PermissionSet, Role},
    api::middleware::session_token,
    auth::SessionAuth,
    context::AppContext,
    error::{DashboardError, DashboardResult},
    session::{Principal, Session},
};
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(get_session))
}

/// Session details returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub username: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub is_admin: bool,
    pub logged_in_at: DateTime<Utc>,
}

impl From<&Principal> for SessionInfo {
    fn from(principal: &Principal) -> Self {
        Self {
            username: principal.username.clone(),
            role: principal.role,
            permissions: principal.permissions.clone(),
            is_admin: principal.role == Role::Admin,
            logged_in_at: principal.logged_in_at,
        }
    }
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: Uuid,
    /// Idle seconds before the session lapses
    pub expires_in: u64,
    pub session: SessionInfo,
}

/// Authenticate and open a session
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> DashboardResult<Json<LoginResponse>> {
    ctx.login_throttle.check(&req.username)?;

    let mut session = Session::new();
    let authenticated = {
        let mut store = ctx.store()?;
        session.login(&req.username, &req.password, &mut store)
    };

    if !authenticated {
        ctx.audit.login_failed(&req.username);
        if let Some(lockout) = ctx.login_throttle.record_failure(&req.username) {
            ctx.audit.login_locked(&req.username, lockout.as_secs());
        }
        return Err(DashboardError::AuthenticationFailure);
    }

    let info = session
        .principal()
        .map(SessionInfo::from)
        .ok_or(DashboardError::AuthenticationFailure)?;

    ctx.login_throttle.record_success(&req.username);
    let token = ctx.sessions.insert(session)?;
    ctx.audit.login_success(&info.username);

    Ok(Json(LoginResponse {
        token,
        expires_in: ctx.config.authentication.session_timeout,
        session: info,
    }))
}

/// End the caller's session; succeeds whether or not one exists
async fn logout(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> DashboardResult<Json<serde_json::Value>> {
    if let Some(token) = session_token(&headers) {
        if let Some(session) = ctx.sessions.get(&token)? {
            if let Some(username) = session.username() {
                ctx.audit.logout(username);
            }
        }
        ctx.sessions.remove(&token)?;
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Describe the caller's session
async fn get_session(auth: SessionAuth) -> DashboardResult<Json<SessionInfo>> {
    let principal = auth
        .principal()
        .ok_or(DashboardError::AuthenticationRequired)?;
    Ok(Json(SessionInfo::from(principal)))
}
