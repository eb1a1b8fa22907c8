/// Account administration endpoints (admin role required)
use crate::{
    account::{AccountInfo, AccountUpdate, CreateAccountRequest, Permission, Role},
    audit::AuditEvent,
    auth::AdminAuth,
    context::AppContext,
    error::{DashboardError, DashboardResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};

/// Build account administration routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/users", get(list_users).post(create_user))
        .route(
            "/api/admin/users/:username",
            patch(update_user).delete(delete_user),
        )
        .route("/api/admin/users/:username/activate", post(activate_user))
        .route("/api/admin/users/:username/deactivate", post(deactivate_user))
}

/// A write failure still leaves the change applied in memory
fn applied<T>(result: &DashboardResult<T>) -> bool {
    matches!(result, Ok(_) | Err(DashboardError::StoreWrite(_)))
}

/// List every account
async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminAuth,
) -> DashboardResult<Json<Vec<AccountInfo>>> {
    let store = ctx.store()?;
    let accounts = store.list_accounts().values().map(AccountInfo::from).collect();
    Ok(Json(accounts))
}

/// Create an account
///
/// `user_management` is only kept for admin accounts.
async fn create_user(
    State(ctx): State<AppContext>,
    admin: AdminAuth,
    Json(req): Json<CreateAccountRequest>,
) -> DashboardResult<(StatusCode, Json<AccountInfo>)> {
    let mut permissions = req
        .permissions
        .unwrap_or_else(|| req.role.default_permissions());
    if req.role != Role::Admin {
        permissions.remove(&Permission::UserManagement);
    }

    let (result, account) = {
        let mut store = ctx.store()?;
        let result = store.create_account(
            &req.username,
            &req.password,
            req.role,
            permissions,
            admin.username(),
        );
        (result, store.get_account(&req.username).map(AccountInfo::from))
    };

    if applied(&result) {
        ctx.audit
            .account_change(AuditEvent::AccountCreated, admin.username(), &req.username);
    }
    result?;

    let account = account.ok_or_else(|| DashboardError::AccountNotFound(req.username.clone()))?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Update password, role, permissions or active flag
async fn update_user(
    State(ctx): State<AppContext>,
    admin: AdminAuth,
    Path(username): Path<String>,
    Json(update): Json<AccountUpdate>,
) -> DashboardResult<Json<AccountInfo>> {
    let (result, current) = {
        let mut store = ctx.store()?;
        let result = store.update_account(&username, update);
        (result, store.get_account(&username).cloned())
    };

    if applied(&result) {
        ctx.audit
            .account_change(AuditEvent::AccountUpdated, admin.username(), &username);
        if let Some(current) = &current {
            if current.active {
                ctx.sessions.refresh_user(current)?;
            } else {
                ctx.sessions.invalidate_user(&username)?;
            }
        }
    }

    let account = result?;
    Ok(Json(AccountInfo::from(&account)))
}

/// Reactivate an account
async fn activate_user(
    State(ctx): State<AppContext>,
    admin: AdminAuth,
    Path(username): Path<String>,
) -> DashboardResult<Json<serde_json::Value>> {
    let result = ctx.store()?.activate_account(&username);
    if applied(&result) {
        ctx.audit
            .account_change(AuditEvent::AccountActivated, admin.username(), &username);
    }
    result?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("User {} activated", username)
    })))
}

/// Deactivate an account and end its sessions
async fn deactivate_user(
    State(ctx): State<AppContext>,
    admin: AdminAuth,
    Path(username): Path<String>,
) -> DashboardResult<Json<serde_json::Value>> {
    let result = ctx.store()?.deactivate_account(&username);
    if applied(&result) {
        ctx.audit
            .account_change(AuditEvent::AccountDeactivated, admin.username(), &username);
        ctx.sessions.invalidate_user(&username)?;
    }
    result?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("User {} deactivated", username)
    })))
}

/// Delete an account and end its sessions
async fn delete_user(
    State(ctx): State<AppContext>,
    admin: AdminAuth,
    Path(username): Path<String>,
) -> DashboardResult<Json<serde_json::Value>> {
    let result = ctx.store()?.delete_account(&username, admin.username());
    if applied(&result) {
        ctx.audit
            .account_change(AuditEvent::AccountDeleted, admin.username(), &username);
        ctx.sessions.invalidate_user(&username)?;
    }
    result?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("User {} deleted successfully", username)
    })))
}
