//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// Configuration for an embedded replica of a shared remote database
///
/// Several worker processes pointed at the same remote database share the
/// cache table and the run-lock leases.
#[derive(Clone, Default)]
pub struct ReplicaConfig {
    /// Remote database URL (e.g., `libsql://bal.turso.io`)
    pub url: Option<String>,
    /// Authentication token for remote database
    pub auth_token: Option<String>,
    /// Automatic sync interval
    pub sync_interval: Option<Duration>,
}

impl std::fmt::Debug for ReplicaConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReplicaConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}

impl ReplicaConfig {
    /// Create a new replica configuration
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            auth_token: Some(auth_token.into()),
            sync_interval: Some(Duration::from_secs(5)),
        }
    }

    /// Set the automatic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Check if the replica is configured
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.auth_token.is_some()
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    replica: Option<ReplicaConfig>,
}

impl Database {
    /// Open a local-only database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            replica: None,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            replica: None,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open a database as an embedded replica of a remote libSQL database
    ///
    /// Reads are served from the local file, writes go to the remote and sync back.
    pub async fn open_with_replica(
        local_path: impl AsRef<Path>,
        replica: ReplicaConfig,
    ) -> Result<Self> {
        let path_str = local_path.as_ref().to_string_lossy().to_string();

        let url = replica
            .url
            .as_ref()
            .ok_or_else(|| crate::error::Error::InvalidInput("Replica URL is required".into()))?;
        let token = replica
            .auth_token
            .as_ref()
            .ok_or_else(|| crate::error::Error::InvalidInput("Auth token is required".into()))?;

        let mut builder = Builder::new_remote_replica(&path_str, url.clone(), token.clone());
        if let Some(interval) = replica.sync_interval {
            builder = builder.sync_interval(interval);
            tracing::debug!("Automatic replica sync interval set to {:?}", interval);
        }

        let db = builder.build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            replica: Some(replica),
        };

        // Pull the remote schema before migrating
        database.sync().await?;
        database.configure().await?;
        database.migrate().await?;

        Ok(database)
    }

    async fn configure(&self) -> Result<()> {
        // Some pragmas are rejected by remote replicas
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Pull changes from the remote database (if configured)
    pub async fn sync(&self) -> Result<()> {
        if self.replica.is_some() {
            self.db.sync().await?;
            tracing::debug!("Database replica synced with remote");
        }
        Ok(())
    }

    pub const fn is_replica(&self) -> bool {
        self.replica.is_some()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(!db.is_replica());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_file_runs_migrations() {
        let tmp = tempdir().unwrap();
        let db = Database::open(tmp.path().join("bal.db")).await.unwrap();

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM base_locales", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[test]
    fn test_replica_config_new() {
        let config = ReplicaConfig::new("libsql://bal.turso.io", "secret-token");
        assert!(config.is_configured());
        assert_eq!(config.url.as_deref(), Some("libsql://bal.turso.io"));
        assert!(!format!("{config:?}").contains("secret-token"));
    }

    #[test]
    fn test_replica_config_default_not_configured() {
        assert!(!ReplicaConfig::default().is_configured());
    }
}
