use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::{
    error::{AppQuery, AppResult},
    export,
    middleware::AuthUser,
    reports,
    state::AppState,
    types::{DailyQuery, DailyReport, ExportQuery, Summary, UserPerformance},
};

pub async fn summary(State(state): State<AppState>, actor: AuthUser) -> AppResult<Json<Summary>> {
    Ok(Json(reports::summary(state.store.as_ref(), &actor, Utc::now()).await?))
}

pub async fn daily(
    State(state): State<AppState>,
    actor: AuthUser,
    AppQuery(query): AppQuery<DailyQuery>,
) -> AppResult<Json<Vec<DailyReport>>> {
    let days = reports::parse_days(query.days.as_deref());
    Ok(Json(reports::daily(state.store.as_ref(), &actor, days, Utc::now()).await?))
}

pub async fn user_performance(State(state): State<AppState>) -> AppResult<Json<Vec<UserPerformance>>> {
    Ok(Json(reports::user_performance(state.store.as_ref(), Utc::now()).await?))
}

pub async fn export_scans(
    State(state): State<AppState>,
    actor: AuthUser,
    AppQuery(query): AppQuery<ExportQuery>,
) -> AppResult<Response> {
    let rows = reports::export_rows(state.store.as_ref(), &query).await?;
    let count = rows.len();

    // Workbook rendering is CPU-bound
    let bytes = tokio::task::spawn_blocking(move || export::render_workbook(&rows))
        .await
        .map_err(|e| anyhow::anyhow!("export task failed: {}", e))??;

    let filename = export::export_filename(Utc::now());
    info!(by = %actor.username, rows = count, file = %filename, "Scan report exported");
    Ok((
        [
            (header::CONTENT_TYPE, export::XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename={}", filename)),
        ],
        bytes,
    )
        .into_response())
}
