/// Unified error types for the campus dashboard
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the dashboard
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Wrong password, unknown user or inactive account. The message is the
    /// same for all three causes.
    #[error("Invalid credentials or inactive account")]
    AuthenticationFailure,

    /// No authenticated session on a protected operation
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Authenticated, but the session lacks the permission or role
    #[error("Access denied. Required permission: {0}")]
    PermissionDenied(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    DuplicateAccount(String),

    /// Username not in the store
    #[error("User not found: {0}")]
    AccountNotFound(String),

    /// Operation not allowed on the bootstrap account
    #[error("{0}")]
    ProtectedAccount(String),

    /// An account tried to delete itself
    #[error("Cannot delete your own account")]
    SelfDeletion,

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Username temporarily locked after repeated failed logins
    #[error("Too many failed login attempts, retry in {} seconds", retry_after.as_secs())]
    TooManyAttempts { retry_after: std::time::Duration },

    /// Global request rate exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Account file could not be read
    #[error("Account store unreadable: {0}")]
    StoreRead(String),

    /// Account file could not be written; the in-memory change stands but
    /// may be lost on restart
    #[error("Account store write failed, change may be lost on restart: {0}")]
    StoreWrite(String),

    /// Time-series provider unreachable or errored
    #[error("Data provider error: {0}")]
    Provider(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    /// Business-rule rejections, as opposed to infrastructure failures
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            DashboardError::StoreRead(_)
                | DashboardError::StoreWrite(_)
                | DashboardError::Provider(_)
                | DashboardError::Io(_)
                | DashboardError::Internal(_)
        )
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert DashboardError to HTTP response
impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            DashboardError::AuthenticationFailure | DashboardError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            DashboardError::PermissionDenied(_) => {
                (StatusCode::FORBIDDEN, "Forbidden", self.to_string())
            }
            DashboardError::ProtectedAccount(_) => {
                (StatusCode::FORBIDDEN, "ProtectedAccount", self.to_string())
            }
            DashboardError::SelfDeletion => {
                (StatusCode::FORBIDDEN, "SelfDeletion", self.to_string())
            }
            DashboardError::DuplicateAccount(_) => {
                (StatusCode::CONFLICT, "DuplicateAccount", self.to_string())
            }
            DashboardError::AccountNotFound(_) => {
                (StatusCode::NOT_FOUND, "AccountNotFound", self.to_string())
            }
            DashboardError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            DashboardError::TooManyAttempts { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "TooManyAttempts",
                self.to_string(),
            ),
            DashboardError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                self.to_string(),
            ),
            DashboardError::StoreWrite(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "StoreWriteFailed",
                "Change applied but could not be saved; it may be lost on restart".to_string(),
            ),
            DashboardError::Provider(_) => (
                StatusCode::BAD_GATEWAY,
                "ProviderUnavailable",
                "Sensor database unavailable".to_string(),
            ),
            DashboardError::StoreRead(_) | DashboardError::Io(_) | DashboardError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let retry_after = match &self {
            DashboardError::TooManyAttempts { retry_after } => Some(retry_after.as_secs()),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for dashboard operations
pub type DashboardResult<T> = Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_vs_infrastructure() {
        assert!(DashboardError::AuthenticationFailure.is_rejection());
        assert!(DashboardError::SelfDeletion.is_rejection());
        assert!(DashboardError::DuplicateAccount("alice".into()).is_rejection());
        assert!(!DashboardError::StoreWrite("disk full".into()).is_rejection());
        assert!(!DashboardError::Provider("timeout".into()).is_rejection());
    }

    #[test]
    fn test_status_codes() {
        let resp = DashboardError::AuthenticationFailure.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = DashboardError::SelfDeletion.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = DashboardError::AccountNotFound("bob".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = DashboardError::TooManyAttempts {
            retry_after: std::time::Duration::from_secs(42),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
