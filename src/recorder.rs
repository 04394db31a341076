//! Scan submission and retrieval.
//!
//! Scans are linked to a registered unit: the submitted `qr_code` must resolve
//! to a live, active unit. Every event is stamped by the server.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::AuthUser;
use crate::reports::{day_start, non_blank, parse_bool, parse_date, windows_at};
use crate::store::Store;
use crate::types::{NewScan, ScanFilter, ScanListQuery, ScanRecord, SubmitScanRequest, TodayStats};

pub const MAX_QR_CODE_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 500;
/// Upper bound on rows returned by [`list`].
pub const LIST_LIMIT: i64 = 100;

pub async fn submit(store: &dyn Store, actor: &AuthUser, req: SubmitScanRequest) -> AppResult<ScanRecord> {
    let qr_code = req.qr_code.trim();
    if qr_code.is_empty() {
        return Err(AppError::validation("qr_code", "is required"));
    }
    if qr_code.chars().count() > MAX_QR_CODE_LEN {
        return Err(AppError::validation("qr_code", format!("must be at most {} characters", MAX_QR_CODE_LEN)));
    }
    if req.notes.chars().count() > MAX_NOTES_LEN {
        return Err(AppError::validation("notes", format!("must be at most {} characters", MAX_NOTES_LEN)));
    }

    let unit = store.find_unit_by_code(qr_code).await?.ok_or_not_found("Unit")?;
    if !unit.is_active {
        return Err(AppError::InvalidState(format!("Unit '{}' is inactive", unit.qr_code)));
    }

    let record = store
        .insert_scan(NewScan {
            unit_id: unit.id,
            user_id: actor.id,
            is_match: req.is_match,
            notes: req.notes,
            scanned_at: Utc::now(),
        })
        .await?;
    tracing::debug!(scan_id = record.id, unit = %unit.qr_code, user = %actor.username, "Scan recorded");
    Ok(record)
}

/// Translates list query parameters into a store filter scoped to what `actor` may see.
pub fn list_filter(actor: &AuthUser, query: &ScanListQuery) -> AppResult<ScanFilter> {
    let mut filter = ScanFilter { user_id: actor.visible_user_id(), ..Default::default() };

    if let Some(raw) = non_blank(query.date.as_deref()) {
        let date = parse_date("date", raw)?;
        filter.from = Some(day_start(date));
        filter.until = Some(day_start(date + Duration::days(1)));
    }
    if let Some(code) = non_blank(query.qr_code.as_deref()) {
        filter.qr_code_contains = Some(code.to_string());
    }
    if let Some(raw) = non_blank(query.is_match.as_deref()) {
        filter.is_match = Some(parse_bool("is_match", raw)?);
    }
    Ok(filter)
}

/// The newest [`LIST_LIMIT`] events matching `query`.
pub async fn list(store: &dyn Store, actor: &AuthUser, query: &ScanListQuery) -> AppResult<Vec<ScanRecord>> {
    let filter = list_filter(actor, query)?;
    Ok(store.list_scans(&filter, Some(LIST_LIMIT)).await?)
}

/// Today's counts, with the same visibility rule as [`list`].
pub async fn stats(store: &dyn Store, actor: &AuthUser, now: DateTime<Utc>) -> AppResult<TodayStats> {
    let filter = ScanFilter {
        user_id: actor.visible_user_id(),
        from: Some(windows_at(now).today),
        until: Some(now + Duration::milliseconds(1)),
        ..Default::default()
    };
    Ok(TodayStats { today: store.count_scans(&filter).await? })
}
