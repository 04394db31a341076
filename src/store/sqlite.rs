use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row, Sqlite, SqlitePool,
};

use super::{Store, StoreError, StoreResult};
use crate::types::{
    NewScan, NewUnit, NewUser, Role, ScanCounts, ScanFilter, ScanRecord, Unit, UnitFilter, UnitRef, User,
    UserRef,
};

const USER_COLUMNS: &str = "id, username, password_hash, name, role, created_at, updated_at";
const UNIT_COLUMNS: &str = "id, qr_code, name, expected_grade, location, is_active, created_at, updated_at";
const SCAN_SELECT: &str = "SELECT s.id, s.is_match, s.notes, s.scanned_at, \
     u.id AS unit_id, u.qr_code, u.name AS unit_name, u.expected_grade, u.location, \
     us.id AS user_id, us.username, us.name AS user_name \
     FROM scan_logs s \
     JOIN units u ON u.id = s.unit_id \
     JOIN users us ON us.id = s.user_id \
     WHERE 1 = 1";

/// `Store` backed by an SQLite connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            tracing::info!("Creating SQLite database at {}", url);
            Sqlite::create_database(url).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            // In-memory databases live exactly as long as their connection
            .idle_timeout(None)
            .max_lifetime(None)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await {
                        tracing::warn!("Failed to set busy timeout: {}", e);
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await?;

        crate::db::init_db(&pool).await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory store, used by tests and benchmarks.
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn ts(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", ms)))
}

fn map_unique(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(message.to_string());
        }
    }
    StoreError::Database(err)
}

/// Escapes `%`, `_` and `\` so user input is matched literally inside `LIKE ... ESCAPE '\'`.
fn like_pattern(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('%');
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn user_from_row(row: &SqliteRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        role: role.parse::<Role>().map_err(StoreError::Corrupt)?,
        created_at: ts(row.try_get("created_at")?)?,
        updated_at: ts(row.try_get("updated_at")?)?,
    })
}

fn unit_from_row(row: &SqliteRow) -> StoreResult<Unit> {
    Ok(Unit {
        id: row.try_get("id")?,
        qr_code: row.try_get("qr_code")?,
        name: row.try_get("name")?,
        expected_grade: row.try_get("expected_grade")?,
        location: row.try_get("location")?,
        is_active: row.try_get("is_active")?,
        created_at: ts(row.try_get("created_at")?)?,
        updated_at: ts(row.try_get("updated_at")?)?,
    })
}

fn scan_from_row(row: &SqliteRow) -> StoreResult<ScanRecord> {
    Ok(ScanRecord {
        id: row.try_get("id")?,
        is_match: row.try_get("is_match")?,
        notes: row.try_get("notes")?,
        scanned_at: ts(row.try_get("scanned_at")?)?,
        unit: UnitRef {
            id: row.try_get("unit_id")?,
            qr_code: row.try_get("qr_code")?,
            name: row.try_get("unit_name")?,
            expected_grade: row.try_get("expected_grade")?,
            location: row.try_get("location")?,
        },
        user: UserRef {
            id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            name: row.try_get("user_name")?,
        },
    })
}

fn push_scan_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ScanFilter) {
    if let Some(user_id) = filter.user_id {
        qb.push(" AND s.user_id = ").push_bind(user_id);
    }
    if let Some(from) = filter.from {
        qb.push(" AND s.scanned_at >= ").push_bind(from.timestamp_millis());
    }
    if let Some(until) = filter.until {
        qb.push(" AND s.scanned_at < ").push_bind(until.timestamp_millis());
    }
    if let Some(code) = &filter.qr_code_contains {
        qb.push(" AND u.qr_code LIKE ").push_bind(like_pattern(code)).push(" ESCAPE '\\'");
    }
    if let Some(is_match) = filter.is_match {
        qb.push(" AND s.is_match = ").push_bind(is_match);
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?1 AND deleted_at IS NULL", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = ?1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE role = ?1 AND deleted_at IS NULL ORDER BY id",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn count_admins(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin' AND deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now().timestamp_millis();
        let id = sqlx::query(
            "INSERT INTO users (username, password_hash, name, role, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "Username already exists"))?
        .last_insert_rowid();

        self.find_user(id).await?.ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_user(&self, user: &User) -> StoreResult<User> {
        let result = sqlx::query(
            "UPDATE users SET name = ?1, role = ?2, password_hash = ?3, updated_at = ?4 \
             WHERE id = ?5 AND deleted_at IS NULL",
        )
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(Utc::now().timestamp_millis())
        .bind(user.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        self.find_user(user.id).await?.ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn soft_delete_user(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_unit(&self, id: i64) -> StoreResult<Option<Unit>> {
        let row = sqlx::query(&format!("SELECT {} FROM units WHERE id = ?1 AND deleted_at IS NULL", UNIT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(unit_from_row).transpose()
    }

    async fn find_unit_by_code(&self, qr_code: &str) -> StoreResult<Option<Unit>> {
        let row =
            sqlx::query(&format!("SELECT {} FROM units WHERE qr_code = ?1 AND deleted_at IS NULL", UNIT_COLUMNS))
                .bind(qr_code)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(unit_from_row).transpose()
    }

    async fn list_units(&self, filter: &UnitFilter) -> StoreResult<Vec<Unit>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM units WHERE deleted_at IS NULL", UNIT_COLUMNS));
        if let Some(active) = filter.active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(search) = &filter.search {
            let pattern = like_pattern(search);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR qr_code LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(unit_from_row).collect()
    }

    async fn create_unit(&self, unit: NewUnit) -> StoreResult<Unit> {
        let now = Utc::now().timestamp_millis();
        let id = sqlx::query(
            "INSERT INTO units (qr_code, name, expected_grade, location, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        )
        .bind(&unit.qr_code)
        .bind(&unit.name)
        .bind(&unit.expected_grade)
        .bind(&unit.location)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "QR code already exists"))?
        .last_insert_rowid();

        self.find_unit(id).await?.ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_unit(&self, unit: &Unit) -> StoreResult<Unit> {
        let result = sqlx::query(
            "UPDATE units SET qr_code = ?1, name = ?2, expected_grade = ?3, location = ?4, is_active = ?5, \
             updated_at = ?6 WHERE id = ?7 AND deleted_at IS NULL",
        )
        .bind(&unit.qr_code)
        .bind(&unit.name)
        .bind(&unit.expected_grade)
        .bind(&unit.location)
        .bind(unit.is_active)
        .bind(Utc::now().timestamp_millis())
        .bind(unit.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "QR code already exists"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        self.find_unit(unit.id).await?.ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn soft_delete_unit(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE units SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL")
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_scan(&self, scan: NewScan) -> StoreResult<ScanRecord> {
        let id = sqlx::query(
            "INSERT INTO scan_logs (unit_id, user_id, is_match, notes, scanned_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(scan.unit_id)
        .bind(scan.user_id)
        .bind(scan.is_match)
        .bind(&scan.notes)
        .bind(scan.scanned_at.timestamp_millis())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SCAN_SELECT);
        qb.push(" AND s.id = ").push_bind(id);
        let row = qb.build().fetch_one(&self.pool).await?;
        scan_from_row(&row)
    }

    async fn list_scans(&self, filter: &ScanFilter, limit: Option<i64>) -> StoreResult<Vec<ScanRecord>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SCAN_SELECT);
        push_scan_filter(&mut qb, filter);
        qb.push(" ORDER BY s.scanned_at DESC, s.id DESC");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(scan_from_row).collect()
    }

    async fn count_scans(&self, filter: &ScanFilter) -> StoreResult<ScanCounts> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) AS total, COALESCE(SUM(CASE WHEN s.is_match THEN 1 ELSE 0 END), 0) AS matched \
             FROM scan_logs s JOIN units u ON u.id = s.unit_id WHERE 1 = 1",
        );
        push_scan_filter(&mut qb, filter);

        let row = qb.build().fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        let matched: i64 = row.try_get("matched")?;
        Ok(ScanCounts { total, matched, not_match: total - matched })
    }
}
