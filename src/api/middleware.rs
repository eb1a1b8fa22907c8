/// Request header helpers for session authentication
use axum::http::{header, HeaderMap};
use uuid::Uuid;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Session token carried as a bearer token
pub fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    extract_bearer_token(headers).and_then(|token| Uuid::parse_str(&token).ok())
}
