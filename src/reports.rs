//! Report aggregation over the scan log.
//!
//! All windows are computed from an explicit `now` on UTC day boundaries:
//! today starts at 00:00, the week on the most recent Sunday, the month on
//! the first. Non-admin callers only ever see their own events.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::store::Store;
use crate::types::{DailyReport, ExportQuery, Role, ScanFilter, ScanRecord, Summary, UserPerformance};

pub const DEFAULT_DAILY_DAYS: i64 = 7;
pub const MAX_DAILY_DAYS: i64 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Start instants of the report windows containing `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindows {
    pub today: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn windows_at(now: DateTime<Utc>) -> ReportWindows {
    let today = now.date_naive();
    let week = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let month = today - Duration::days(i64::from(today.day0()));
    ReportWindows { today: day_start(today), week: day_start(week), month: day_start(month), now }
}

/// Parses a `YYYY-MM-DD` query value.
pub fn parse_date(field: &str, raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| AppError::validation(field, format!("expected a date in YYYY-MM-DD format, got '{}'", raw)))
}

/// Parses a `true` / `false` query value.
pub fn parse_bool(field: &str, raw: &str) -> AppResult<bool> {
    match raw.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(AppError::validation(field, format!("expected 'true' or 'false', got '{}'", other))),
    }
}

/// Treats a missing or blank query value as absent.
pub fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Number of days for the daily report: missing, non-numeric or non-positive
/// input falls back to 7, anything above 30 is capped.
pub fn parse_days(raw: Option<&str>) -> i64 {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(days) if days > MAX_DAILY_DAYS => MAX_DAILY_DAYS,
        Some(days) if days > 0 => days,
        _ => DEFAULT_DAILY_DAYS,
    }
}

fn scoped(actor: &AuthUser, from: DateTime<Utc>, until: DateTime<Utc>) -> ScanFilter {
    ScanFilter { user_id: actor.visible_user_id(), from: Some(from), until: Some(until), ..Default::default() }
}

pub async fn summary(store: &dyn Store, actor: &AuthUser, now: DateTime<Utc>) -> AppResult<Summary> {
    let w = windows_at(now);
    // Bounded by `now + 1ms` so an event stamped in the current millisecond is counted
    let until = now + Duration::milliseconds(1);
    Ok(Summary {
        today: store.count_scans(&scoped(actor, w.today, until)).await?,
        week: store.count_scans(&scoped(actor, w.week, until)).await?,
        month: store.count_scans(&scoped(actor, w.month, until)).await?,
    })
}

/// Per-day counts for the last `days` days, today first.
pub async fn daily(
    store: &dyn Store,
    actor: &AuthUser,
    days: i64,
    now: DateTime<Utc>,
) -> AppResult<Vec<DailyReport>> {
    let today = now.date_naive();
    let mut reports = Vec::with_capacity(days.max(0) as usize);
    for offset in 0..days {
        let date = today - Duration::days(offset);
        let filter = scoped(actor, day_start(date), day_start(date + Duration::days(1)));
        let counts = store.count_scans(&filter).await?;
        reports.push(DailyReport { date, counts });
    }
    Ok(reports)
}

/// Week-to-date counts of every live `user`-role account.
pub async fn user_performance(store: &dyn Store, now: DateTime<Utc>) -> AppResult<Vec<UserPerformance>> {
    let w = windows_at(now);
    let until = now + Duration::milliseconds(1);
    let users = store.list_users_by_role(Role::User).await?;

    let mut out = Vec::with_capacity(users.len());
    for user in users {
        let filter =
            ScanFilter { user_id: Some(user.id), from: Some(w.week), until: Some(until), ..Default::default() };
        let counts = store.count_scans(&filter).await?;
        out.push(UserPerformance { user_id: user.id, username: user.username, user_name: user.name, counts });
    }
    Ok(out)
}

/// Builds the export filter: `[start 00:00, end + 1 day 00:00)`, either bound optional.
pub fn export_filter(query: &ExportQuery) -> AppResult<ScanFilter> {
    let start = non_blank(query.start_date.as_deref()).map(|s| parse_date("start_date", s)).transpose()?;
    let end = non_blank(query.end_date.as_deref()).map(|s| parse_date("end_date", s)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::validation("end_date", "must not be before start_date"));
        }
    }
    Ok(ScanFilter {
        from: start.map(day_start),
        until: end.map(|d| day_start(d + Duration::days(1))),
        ..Default::default()
    })
}

/// Every matching event, newest first. Not capped.
pub async fn export_rows(store: &dyn Store, query: &ExportQuery) -> AppResult<Vec<ScanRecord>> {
    let filter = export_filter(query)?;
    Ok(store.list_scans(&filter, None).await?)
}
