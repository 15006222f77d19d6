//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Apply a list of statements inside one transaction
async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: BaseLocale dataset schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS base_locales (
                id TEXT PRIMARY KEY,
                nom TEXT NOT NULL,
                commune TEXT NOT NULL,
                nom_commune TEXT NOT NULL,
                emails TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL,
                habilitation_id TEXT,
                ban_id TEXT,
                sync_status TEXT,
                sync_is_paused INTEGER NOT NULL DEFAULT 0,
                sync_last_uploaded_revision_id TEXT,
                sync_current_updated INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_base_locales_commune ON base_locales(commune, status)",
            "CREATE INDEX IF NOT EXISTS idx_base_locales_sync ON base_locales(sync_status, updated_at)",
            "CREATE TABLE IF NOT EXISTS voies (
                id TEXT PRIMARY KEY,
                base_locale_id TEXT NOT NULL REFERENCES base_locales(id) ON DELETE CASCADE,
                nom TEXT NOT NULL,
                ban_id TEXT,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_voies_bal ON voies(base_locale_id)",
            "CREATE TABLE IF NOT EXISTS toponymes (
                id TEXT PRIMARY KEY,
                base_locale_id TEXT NOT NULL REFERENCES base_locales(id) ON DELETE CASCADE,
                nom TEXT NOT NULL,
                ban_id TEXT,
                parcelles TEXT NOT NULL DEFAULT '[]',
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_toponymes_bal ON toponymes(base_locale_id)",
            "CREATE TABLE IF NOT EXISTS numeros (
                id TEXT PRIMARY KEY,
                base_locale_id TEXT NOT NULL REFERENCES base_locales(id) ON DELETE CASCADE,
                voie_id TEXT NOT NULL REFERENCES voies(id) ON DELETE CASCADE,
                toponyme_id TEXT REFERENCES toponymes(id) ON DELETE SET NULL,
                numero INTEGER NOT NULL,
                suffixe TEXT,
                certifie INTEGER NOT NULL DEFAULT 0,
                ban_id TEXT,
                parcelles TEXT NOT NULL DEFAULT '[]',
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_numeros_bal ON numeros(base_locale_id, deleted_at)",
            "CREATE INDEX IF NOT EXISTS idx_numeros_voie ON numeros(voie_id)",
            "CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                numero_id TEXT REFERENCES numeros(id) ON DELETE CASCADE,
                toponyme_id TEXT REFERENCES toponymes(id) ON DELETE CASCADE,
                rank INTEGER NOT NULL,
                kind TEXT NOT NULL,
                longitude REAL NOT NULL,
                latitude REAL NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_positions_numero ON positions(numero_id)",
            "CREATE INDEX IF NOT EXISTS idx_positions_toponyme ON positions(toponyme_id)",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: shared cache and run-lock leases
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS leases (
                key TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )
    .await?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?
                )",
                [name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_create_dataset_and_cache_tables() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in [
            "base_locales",
            "voies",
            "toponymes",
            "numeros",
            "positions",
            "cache",
            "leases",
        ] {
            assert!(table_exists(&conn, table).await, "missing table {table}");
        }
    }
}
