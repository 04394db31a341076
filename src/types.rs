use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Closed set: every authorization decision matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Unit {
    pub id: i64,
    pub qr_code: String,
    pub name: String,
    pub expected_grade: String,
    pub location: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUnit {
    pub qr_code: String,
    pub name: String,
    pub expected_grade: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct NewScan {
    pub unit_id: i64,
    pub user_id: i64,
    pub is_match: bool,
    pub notes: String,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    pub id: i64,
    pub qr_code: String,
    pub name: String,
    pub expected_grade: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
    pub name: String,
}

/// A scan event joined with the unit and user it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub is_match: bool,
    pub notes: String,
    pub scanned_at: DateTime<Utc>,
    pub unit: UnitRef,
    pub user: UserRef,
}

/// total / match / not_match triple shared by every report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    pub total: i64,
    #[serde(rename = "match")]
    pub matched: i64,
    pub not_match: i64,
}

/// Storage-level filter for scan reads and counts. Empty filter = everything.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub user_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub qr_code_contains: Option<String>,
    pub is_match: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    pub active: Option<bool>,
    pub search: Option<String>,
}

// Request / response DTOs

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUnitRequest {
    pub qr_code: String,
    pub name: String,
    #[serde(default)]
    pub expected_grade: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUnitRequest {
    pub qr_code: Option<String>,
    pub name: Option<String>,
    pub expected_grade: Option<String>,
    pub location: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UnitListQuery {
    pub active: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitScanRequest {
    pub qr_code: String,
    pub is_match: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanListQuery {
    pub date: Option<String>,
    pub qr_code: Option<String>,
    pub is_match: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyQuery {
    pub days: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodayStats {
    pub today: ScanCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub today: ScanCounts,
    pub week: ScanCounts,
    pub month: ScanCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: ScanCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPerformance {
    pub user_id: i64,
    pub username: String,
    pub user_name: String,
    #[serde(flatten)]
    pub counts: ScanCounts,
}
