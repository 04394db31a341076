use sqlx::SqlitePool;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    // Timestamps are unix milliseconds (UTC).
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            qr_code TEXT NOT NULL,
            name TEXT NOT NULL,
            expected_grade TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER NULL
        )"#,
    )
    .execute(pool)
    .await?;

    // Users and units are only soft-deleted, so these references never dangle.
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS scan_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            unit_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            is_match INTEGER NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            scanned_at INTEGER NOT NULL,
            FOREIGN KEY(unit_id) REFERENCES units(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )"#,
    )
    .execute(pool)
    .await?;

    // Uniqueness only applies to live rows
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_live ON users(username) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_units_qr_code_live ON units(qr_code) WHERE deleted_at IS NULL")
        .execute(pool)
        .await?;

    // The scan log is append-only
    sqlx::query(
        r#"CREATE TRIGGER IF NOT EXISTS scan_logs_no_update BEFORE UPDATE ON scan_logs
           BEGIN SELECT RAISE(ABORT, 'scan_logs is append-only'); END"#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        r#"CREATE TRIGGER IF NOT EXISTS scan_logs_no_delete BEFORE DELETE ON scan_logs
           BEGIN SELECT RAISE(ABORT, 'scan_logs is append-only'); END"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_scan_logs_scanned_at", "CREATE INDEX IF NOT EXISTS idx_scan_logs_scanned_at ON scan_logs(scanned_at DESC)"),
        ("idx_scan_logs_user_time", "CREATE INDEX IF NOT EXISTS idx_scan_logs_user_time ON scan_logs(user_id, scanned_at DESC)"),
        ("idx_scan_logs_unit", "CREATE INDEX IF NOT EXISTS idx_scan_logs_unit ON scan_logs(unit_id)"),
        ("idx_users_role", "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}
