use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{self, password},
    error::{AppError, AppJson, AppPath, AppResult, OptionExt},
    middleware::AuthUser,
    state::AppState,
    types::{CreateUserRequest, NewUser, UpdateUserRequest, User},
};

const MAX_USERNAME_LEN: usize = 50;
const MAX_NAME_LEN: usize = 100;

fn required(field: &str, value: &str, max: usize) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(field, "is required"));
    }
    if value.chars().count() > max {
        return Err(AppError::validation(field, format!("must be at most {} characters", max)));
    }
    Ok(value.to_string())
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.store.list_users().await?))
}

pub async fn get_user(State(state): State<AppState>, AppPath(id): AppPath<i64>) -> AppResult<Json<User>> {
    Ok(Json(state.store.find_user(id).await?.ok_or_not_found("User")?))
}

pub async fn create_user(
    State(state): State<AppState>,
    actor: AuthUser,
    AppJson(req): AppJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let username = required("username", &req.username, MAX_USERNAME_LEN)?;
    let name = required("name", &req.name, MAX_NAME_LEN)?;
    auth::validate_new_password("password", &req.password)?;

    let password_hash = password::hash_password(&req.password, state.config.auth.bcrypt_cost).await?;
    let user = state.store.create_user(NewUser { username, password_hash, name, role: req.role }).await?;

    info!(by = %actor.username, user = %user.username, role = %user.role, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    let mut user = state.store.find_user(id).await?.ok_or_not_found("User")?;

    if let Some(name) = req.name.as_deref() {
        user.name = required("name", name, MAX_NAME_LEN)?;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(new_password) = req.password.as_deref() {
        auth::validate_new_password("password", new_password)?;
        user.password_hash = password::hash_password(new_password, state.config.auth.bcrypt_cost).await?;
    }

    let user = state.store.update_user(&user).await?;
    info!(by = %actor.username, user = %user.username, "User updated");
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Value>> {
    if id == actor.id {
        return Err(AppError::Forbidden("Cannot delete your own account".to_string()));
    }
    if !state.store.soft_delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    info!(by = %actor.username, user_id = id, "User deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
