use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::{
    error::{AppJson, AppQuery, AppResult},
    middleware::AuthUser,
    recorder,
    state::AppState,
    types::{ScanListQuery, ScanRecord, SubmitScanRequest, TodayStats},
};

pub async fn submit_scan(
    State(state): State<AppState>,
    actor: AuthUser,
    AppJson(req): AppJson<SubmitScanRequest>,
) -> AppResult<(StatusCode, Json<ScanRecord>)> {
    let record = recorder::submit(state.store.as_ref(), &actor, req).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_scans(
    State(state): State<AppState>,
    actor: AuthUser,
    AppQuery(query): AppQuery<ScanListQuery>,
) -> AppResult<Json<Vec<ScanRecord>>> {
    Ok(Json(recorder::list(state.store.as_ref(), &actor, &query).await?))
}

pub async fn scan_stats(State(state): State<AppState>, actor: AuthUser) -> AppResult<Json<TodayStats>> {
    Ok(Json(recorder::stats(state.store.as_ref(), &actor, Utc::now()).await?))
}
