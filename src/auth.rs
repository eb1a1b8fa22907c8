/// Authentication extractors
///
/// Handlers take `SessionAuth` or `AdminAuth` as an argument; the extractor
/// runs before the handler body and rejects the request if the check fails.
use crate::{
    account::Permission,
    api::middleware::session_token,
    context::AppContext,
    error::DashboardError,
    session::{Principal, Session},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Authenticated session, resolved from the bearer token
#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub token: Uuid,
    pub session: Session,
}

impl SessionAuth {
    pub fn principal(&self) -> Option<&Principal> {
        self.session.principal()
    }

    pub fn username(&self) -> &str {
        self.session.username().unwrap_or_default()
    }

    /// Permission guard; denials are audited
    pub fn require(&self, ctx: &AppContext, permission: Permission) -> Result<(), DashboardError> {
        if let Err(e) = self.session.require_permission(permission) {
            ctx.audit
                .permission_denied(self.username(), permission.as_str());
            return Err(e);
        }
        Ok(())
    }
}

fn resolve_session(parts: &Parts, state: &AppContext) -> Result<SessionAuth, DashboardError> {
    let token = session_token(&parts.headers).ok_or(DashboardError::AuthenticationRequired)?;

    let session = state
        .sessions
        .get(&token)?
        .filter(Session::is_authenticated)
        .ok_or(DashboardError::AuthenticationRequired)?;

    Ok(SessionAuth { token, session })
}

#[async_trait]
impl FromRequestParts<AppContext> for SessionAuth {
    type Rejection = DashboardError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state)
    }
}

/// Authenticated session whose role is admin
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub token: Uuid,
    pub principal: Principal,
}

impl AdminAuth {
    pub fn username(&self) -> &str {
        &self.principal.username
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuth {
    type Rejection = DashboardError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = resolve_session(parts, state)?;

        let principal = match auth.session.require_admin() {
            Ok(principal) => principal.clone(),
            Err(e) => {
                tracing::warn!("AdminAuth: {} is not an admin", auth.username());
                state.audit.permission_denied(auth.username(), "admin role");
                return Err(e);
            }
        };

        Ok(AdminAuth {
            token: auth.token,
            principal,
        })
    }
}
