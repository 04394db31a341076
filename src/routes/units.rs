use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{AppError, AppJson, AppPath, AppQuery, AppResult, OptionExt},
    middleware::AuthUser,
    recorder::MAX_QR_CODE_LEN,
    reports::{non_blank, parse_bool},
    state::AppState,
    types::{CreateUnitRequest, NewUnit, Unit, UnitFilter, UnitListQuery, UpdateUnitRequest},
};

const MAX_NAME_LEN: usize = 200;

fn validate_qr_code(raw: &str) -> AppResult<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(AppError::validation("qr_code", "is required"));
    }
    if code.chars().count() > MAX_QR_CODE_LEN {
        return Err(AppError::validation("qr_code", format!("must be at most {} characters", MAX_QR_CODE_LEN)));
    }
    Ok(code.to_string())
}

fn validate_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("name", "is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("name", format!("must be at most {} characters", MAX_NAME_LEN)));
    }
    Ok(name.to_string())
}

pub async fn list_units(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UnitListQuery>,
) -> AppResult<Json<Vec<Unit>>> {
    let filter = UnitFilter {
        active: non_blank(query.active.as_deref()).map(|s| parse_bool("active", s)).transpose()?,
        search: non_blank(query.search.as_deref()).map(str::to_string),
    };
    Ok(Json(state.store.list_units(&filter).await?))
}

pub async fn get_unit(State(state): State<AppState>, AppPath(id): AppPath<i64>) -> AppResult<Json<Unit>> {
    Ok(Json(state.store.find_unit(id).await?.ok_or_not_found("Unit")?))
}

/// Lookup used by scanning clients: only active units resolve.
pub async fn get_unit_by_code(
    State(state): State<AppState>,
    AppPath(code): AppPath<String>,
) -> AppResult<Json<Unit>> {
    let unit = state
        .store
        .find_unit_by_code(code.trim())
        .await?
        .filter(|u| u.is_active)
        .ok_or_not_found("Unit")?;
    Ok(Json(unit))
}

pub async fn create_unit(
    State(state): State<AppState>,
    actor: AuthUser,
    AppJson(req): AppJson<CreateUnitRequest>,
) -> AppResult<(StatusCode, Json<Unit>)> {
    let unit = NewUnit {
        qr_code: validate_qr_code(&req.qr_code)?,
        name: validate_name(&req.name)?,
        expected_grade: req.expected_grade.trim().to_string(),
        location: req.location.trim().to_string(),
    };
    let unit = state.store.create_unit(unit).await?;

    info!(by = %actor.username, qr_code = %unit.qr_code, "Unit created");
    Ok((StatusCode::CREATED, Json(unit)))
}

pub async fn update_unit(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<i64>,
    AppJson(req): AppJson<UpdateUnitRequest>,
) -> AppResult<Json<Unit>> {
    let mut unit = state.store.find_unit(id).await?.ok_or_not_found("Unit")?;

    if let Some(code) = req.qr_code.as_deref() {
        unit.qr_code = validate_qr_code(code)?;
    }
    if let Some(name) = req.name.as_deref() {
        unit.name = validate_name(name)?;
    }
    if let Some(grade) = req.expected_grade {
        unit.expected_grade = grade.trim().to_string();
    }
    if let Some(location) = req.location {
        unit.location = location.trim().to_string();
    }
    if let Some(active) = req.is_active {
        unit.is_active = active;
    }

    let unit = state.store.update_unit(&unit).await?;
    info!(by = %actor.username, unit_id = unit.id, active = unit.is_active, "Unit updated");
    Ok(Json(unit))
}

pub async fn delete_unit(
    State(state): State<AppState>,
    actor: AuthUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Value>> {
    if !state.store.soft_delete_unit(id).await? {
        return Err(AppError::NotFound("Unit not found".to_string()));
    }
    info!(by = %actor.username, unit_id = id, "Unit deleted");
    Ok(Json(json!({ "message": "Unit deleted successfully" })))
}
