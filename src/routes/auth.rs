use axum::{extract::State, Json};
use chrono::DateTime;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{self, password},
    error::{AppError, AppJson, AppResult, OptionExt},
    middleware::AuthUser,
    state::AppState,
    types::{ChangePasswordRequest, LoginRequest, LoginResponse, User},
};

pub async fn login(State(state): State<AppState>, AppJson(req): AppJson<LoginRequest>) -> AppResult<Json<LoginResponse>> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::validation("username", "is required"));
    }
    if req.password.is_empty() {
        return Err(AppError::validation("password", "is required"));
    }

    let user = auth::authenticate(state.store.as_ref(), username, &req.password).await?;
    let (token, claims) = state.tokens.issue(&user).map_err(|e| AppError::Internal(e.into()))?;
    let expires_at = DateTime::from_timestamp(claims.exp, 0)
        .ok_or_else(|| anyhow::anyhow!("token expiry out of range: {}", claims.exp))?;

    info!(user = %user.username, role = %user.role, "User logged in");
    Ok(Json(LoginResponse { token, expires_at, user }))
}

pub async fn me(State(state): State<AppState>, actor: AuthUser) -> AppResult<Json<User>> {
    let user = state.store.find_user(actor.id).await?.ok_or_not_found("User")?;
    Ok(Json(user))
}

/// Self-service only: the target is always the caller.
pub async fn change_password(
    State(state): State<AppState>,
    actor: AuthUser,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    auth::validate_new_password("new_password", &req.new_password)?;

    let mut user = state.store.find_user(actor.id).await?.ok_or_not_found("User")?;
    if !password::verify_password(&req.old_password, &user.password_hash).await? {
        return Err(AppError::validation("old_password", "is incorrect"));
    }

    user.password_hash = password::hash_password(&req.new_password, state.config.auth.bcrypt_cost).await?;
    state.store.update_user(&user).await?;

    info!(user = %user.username, "Password changed");
    Ok(Json(json!({ "message": "Password changed successfully" })))
}
