//! BaseLocale repository implementation
//!
//! Every write the reconciliation engine performs is a single `UPDATE`
//! statement, so each BaseLocale row is mutated atomically.

use crate::error::{Error, Result};
use crate::models::{BaseLocale, BaseLocaleId, BaseLocaleStatus, SyncState, SyncStatus};
use libsql::{params, Connection, Row};

const COLUMNS: &str = "id, nom, commune, nom_commune, emails, status, habilitation_id, ban_id, \
     sync_status, sync_is_paused, sync_last_uploaded_revision_id, sync_current_updated, \
     created_at, updated_at, deleted_at";

/// Trait for BaseLocale storage operations (async)
#[allow(async_fn_in_trait)]
pub trait BaseLocaleRepository {
    /// Insert a BaseLocale as-is
    async fn create(&self, bal: &BaseLocale) -> Result<()>;

    /// Get a non-deleted BaseLocale by ID
    async fn get(&self, id: &BaseLocaleId) -> Result<Option<BaseLocale>>;

    /// Attach an habilitation
    async fn set_habilitation(&self, id: &BaseLocaleId, habilitation_id: &str) -> Result<()>;

    /// Bump `updated_at`, as any dataset mutation does
    async fn touch(&self, id: &BaseLocaleId, at: i64) -> Result<()>;

    /// Soft delete a BaseLocale
    async fn soft_delete(&self, id: &BaseLocaleId, at: i64) -> Result<()>;

    /// Record a successful publication: PUBLISHED / SYNCED, unpaused
    async fn mark_published(
        &self,
        id: &BaseLocaleId,
        revision_id: &str,
        current_updated: i64,
    ) -> Result<()>;

    /// Flip SYNCED rows edited since their last snapshot to OUTDATED
    async fn mark_outdated_if_changed(&self) -> Result<u64>;

    /// PUBLISHED and REPLACED BaseLocales of a commune
    async fn list_published_for_commune(&self, commune: &str) -> Result<Vec<BaseLocale>>;

    /// Upstream agrees with this BaseLocale: PUBLISHED / SYNCED
    async fn mark_synced(&self, id: &BaseLocaleId) -> Result<()>;

    /// Another actor published a newer revision: REPLACED / CONFLICT
    async fn mark_replaced(&self, id: &BaseLocaleId) -> Result<()>;

    /// OUTDATED, unpaused BaseLocales whose last edit is older than `updated_before`
    async fn list_ready_to_sync(&self, updated_before: i64) -> Result<Vec<BaseLocaleId>>;

    /// Pause or resume scheduled publication; false when there is no sync record
    async fn set_sync_paused(&self, id: &BaseLocaleId, paused: bool) -> Result<bool>;

    /// Delete DEMO BaseLocales created before the given timestamp
    async fn delete_demo_created_before(&self, before: i64) -> Result<u64>;

    /// Delete BaseLocales soft-deleted before the given timestamp
    async fn delete_soft_deleted_before(&self, before: i64) -> Result<u64>;
}

/// libSQL implementation of `BaseLocaleRepository`
pub struct LibSqlBaseLocaleRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlBaseLocaleRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a BaseLocale from a database row selected with `COLUMNS`
    fn parse_base_locale(row: &Row) -> Result<BaseLocale> {
        let id: String = row.get(0)?;
        let emails: String = row.get(4)?;
        let status: String = row.get(5)?;
        let sync_status: Option<String> = row.get(8)?;

        let sync = match sync_status {
            Some(sync_status) => Some(SyncState {
                status: sync_status.parse()?,
                is_paused: row.get::<i64>(9)? != 0,
                last_uploaded_revision_id: row.get(10)?,
                current_updated: row.get(11)?,
            }),
            None => None,
        };

        Ok(BaseLocale {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid BaseLocale id '{id}'")))?,
            nom: row.get(1)?,
            commune: row.get(2)?,
            nom_commune: row.get(3)?,
            emails: serde_json::from_str(&emails)?,
            status: status.parse()?,
            habilitation_id: row.get(6)?,
            ban_id: row.get(7)?,
            sync,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
            deleted_at: row.get(14)?,
        })
    }

    async fn update_one(&self, id: &BaseLocaleId, sql: &str) -> Result<()> {
        let rows = self.conn.execute(sql, [id.as_str()]).await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("BaseLocale {id}")));
        }
        Ok(())
    }
}

impl BaseLocaleRepository for LibSqlBaseLocaleRepository<'_> {
    async fn create(&self, bal: &BaseLocale) -> Result<()> {
        let sync = bal.sync.as_ref();
        self.conn
            .execute(
                &format!(
                    "INSERT INTO base_locales ({COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    bal.id.as_str(),
                    bal.nom.clone(),
                    bal.commune.clone(),
                    bal.nom_commune.clone(),
                    serde_json::to_string(&bal.emails)?,
                    bal.status.as_str(),
                    bal.habilitation_id.clone(),
                    bal.ban_id.clone(),
                    sync.map(|sync| sync.status.as_str().to_string()),
                    i64::from(sync.is_some_and(|sync| sync.is_paused)),
                    sync.and_then(|sync| sync.last_uploaded_revision_id.clone()),
                    sync.and_then(|sync| sync.current_updated),
                    bal.created_at,
                    bal.updated_at,
                    bal.deleted_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &BaseLocaleId) -> Result<Option<BaseLocale>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COLUMNS} FROM base_locales WHERE id = ? AND deleted_at IS NULL"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_base_locale(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_habilitation(&self, id: &BaseLocaleId, habilitation_id: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE base_locales SET habilitation_id = ? WHERE id = ? AND deleted_at IS NULL",
                params![habilitation_id, id.as_str()],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("BaseLocale {id}")));
        }
        Ok(())
    }

    async fn touch(&self, id: &BaseLocaleId, at: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE base_locales SET updated_at = ? WHERE id = ?",
                params![at, id.as_str()],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("BaseLocale {id}")));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &BaseLocaleId, at: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE base_locales SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
                params![at, id.as_str()],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("BaseLocale {id}")));
        }
        Ok(())
    }

    async fn mark_published(
        &self,
        id: &BaseLocaleId,
        revision_id: &str,
        current_updated: i64,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE base_locales
                 SET status = ?,
                     sync_status = ?,
                     sync_is_paused = 0,
                     sync_last_uploaded_revision_id = ?,
                     sync_current_updated = ?
                 WHERE id = ?",
                params![
                    BaseLocaleStatus::Published.as_str(),
                    SyncStatus::Synced.as_str(),
                    revision_id,
                    current_updated,
                    id.as_str(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("BaseLocale {id}")));
        }
        Ok(())
    }

    async fn mark_outdated_if_changed(&self) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "UPDATE base_locales
                 SET sync_status = 'outdated', sync_current_updated = NULL
                 WHERE deleted_at IS NULL
                   AND sync_status = 'synced'
                   AND (sync_current_updated IS NULL OR updated_at > sync_current_updated)",
                (),
            )
            .await?;
        Ok(rows)
    }

    async fn list_published_for_commune(&self, commune: &str) -> Result<Vec<BaseLocale>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COLUMNS} FROM base_locales
                     WHERE commune = ?
                       AND status IN ('published', 'replaced')
                       AND deleted_at IS NULL
                     ORDER BY id"
                ),
                [commune],
            )
            .await?;

        let mut base_locales = Vec::new();
        while let Some(row) = rows.next().await? {
            base_locales.push(Self::parse_base_locale(&row)?);
        }
        Ok(base_locales)
    }

    async fn mark_synced(&self, id: &BaseLocaleId) -> Result<()> {
        self.update_one(
            id,
            "UPDATE base_locales SET status = 'published', sync_status = 'synced' WHERE id = ?",
        )
        .await
    }

    async fn mark_replaced(&self, id: &BaseLocaleId) -> Result<()> {
        self.update_one(
            id,
            "UPDATE base_locales SET status = 'replaced', sync_status = 'conflict' WHERE id = ?",
        )
        .await
    }

    async fn list_ready_to_sync(&self, updated_before: i64) -> Result<Vec<BaseLocaleId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT id FROM base_locales
                 WHERE deleted_at IS NULL
                   AND sync_status = 'outdated'
                   AND sync_is_paused = 0
                   AND updated_at < ?
                 ORDER BY id",
                [updated_before],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            ids.push(
                id.parse()
                    .map_err(|_| Error::Database(format!("invalid BaseLocale id '{id}'")))?,
            );
        }
        Ok(ids)
    }

    async fn set_sync_paused(&self, id: &BaseLocaleId, paused: bool) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE base_locales SET sync_is_paused = ?
                 WHERE id = ? AND sync_status IS NOT NULL AND deleted_at IS NULL",
                params![i64::from(paused), id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn delete_demo_created_before(&self, before: i64) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM base_locales WHERE status = 'demo' AND created_at < ?",
                [before],
            )
            .await?;
        Ok(rows)
    }

    async fn delete_soft_deleted_before(&self, before: i64) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM base_locales WHERE deleted_at IS NOT NULL AND deleted_at < ?",
                [before],
            )
            .await?;
        Ok(rows)
    }
}
