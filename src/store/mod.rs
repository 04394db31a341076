//! Storage boundary.
//!
//! Handlers and the core services only see the [`Store`] trait; [`SqliteStore`]
//! is the relational implementation used by the server and the tests.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::types::{
    NewScan, NewUnit, NewUser, Role, ScanCounts, ScanFilter, ScanRecord, Unit, UnitFilter, User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (username, qr_code).
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A row could not be mapped back into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract query interface over users, units and the scan log.
///
/// Every method is a single statement; soft-deleted users and units are never
/// returned by lookups, but scans referencing them stay readable.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<User>>;
    async fn count_admins(&self) -> StoreResult<i64>;
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    /// Persists name, role and password hash of an existing user.
    async fn update_user(&self, user: &User) -> StoreResult<User>;
    /// Returns `false` when no live user had that id.
    async fn soft_delete_user(&self, id: i64) -> StoreResult<bool>;

    async fn find_unit(&self, id: i64) -> StoreResult<Option<Unit>>;
    async fn find_unit_by_code(&self, qr_code: &str) -> StoreResult<Option<Unit>>;
    async fn list_units(&self, filter: &UnitFilter) -> StoreResult<Vec<Unit>>;
    async fn create_unit(&self, unit: NewUnit) -> StoreResult<Unit>;
    async fn update_unit(&self, unit: &Unit) -> StoreResult<Unit>;
    async fn soft_delete_unit(&self, id: i64) -> StoreResult<bool>;

    /// Appends a scan event and returns it joined with unit and user data.
    async fn insert_scan(&self, scan: NewScan) -> StoreResult<ScanRecord>;
    /// Newest first. `limit = None` returns every matching event.
    async fn list_scans(&self, filter: &ScanFilter, limit: Option<i64>) -> StoreResult<Vec<ScanRecord>>;
    async fn count_scans(&self, filter: &ScanFilter) -> StoreResult<ScanCounts>;
}
