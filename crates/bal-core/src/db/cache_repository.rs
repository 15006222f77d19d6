//! Shared key/value cache and expiring leases

use crate::error::Result;
use libsql::{params, Connection};

/// Trait for cache and lease operations (async)
#[allow(async_fn_in_trait)]
pub trait CacheRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>>;

    async fn set_value(&self, key: &str, value: &str) -> Result<()>;

    /// Take the lease `key` for `holder` until `expires_at` (ms).
    ///
    /// Succeeds when the lease is free, expired at `now`, or already ours.
    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        now: i64,
        expires_at: i64,
    ) -> Result<bool>;

    /// Release the lease if `holder` still owns it
    async fn release_lease(&self, key: &str, holder: &str) -> Result<bool>;
}

/// libSQL implementation of `CacheRepository`
pub struct LibSqlCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCacheRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CacheRepository for LibSqlCacheRepository<'_> {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM cache WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO cache (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .await?;
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        now: i64,
        expires_at: i64,
    ) -> Result<bool> {
        let changes = self
            .conn
            .execute(
                "INSERT INTO leases (key, holder, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    holder = excluded.holder,
                    expires_at = excluded.expires_at
                 WHERE leases.expires_at <= ?4 OR leases.holder = excluded.holder",
                params![key, holder, expires_at, now],
            )
            .await?;
        Ok(changes == 1)
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<bool> {
        let changes = self
            .conn
            .execute(
                "DELETE FROM leases WHERE key = ? AND holder = ?",
                params![key, holder],
            )
            .await?;
        Ok(changes == 1)
    }
}
