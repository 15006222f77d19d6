//! Shared database service wrapper used by the engine, the worker and the API.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    AddressRepository, BaseLocaleRepository, CacheRepository, Database, LibSqlAddressRepository,
    LibSqlBaseLocaleRepository, LibSqlCacheRepository, NewNumero, ReplicaConfig,
};
use crate::models::{BaseLocale, BaseLocaleId, Dataset, Numero, Position, RecordId, Toponyme, Voie};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DatabaseService")
            .finish_non_exhaustive()
    }
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        replica: Option<ReplicaConfig>,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self::open_database(db_path, replica).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    async fn open_database(db_path: PathBuf, replica: Option<ReplicaConfig>) -> Result<Database> {
        let Some(config) = replica.filter(ReplicaConfig::is_configured) else {
            tracing::info!("Running in local-only mode (no replica config)");
            return Database::open(&db_path).await;
        };

        tracing::info!(
            "Embedded replica of {}",
            config.url.as_deref().unwrap_or("unknown")
        );
        Database::open_with_replica(&db_path, config).await
    }

    /// Pull remote changes when running as a replica.
    pub async fn sync(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.sync().await
    }

    pub async fn create_base_locale(&self, bal: &BaseLocale) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .create(bal)
            .await
    }

    /// Fetch a non-deleted BaseLocale by id.
    pub async fn get_base_locale(&self, id: &BaseLocaleId) -> Result<Option<BaseLocale>> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .get(id)
            .await
    }

    pub async fn set_habilitation(&self, id: &BaseLocaleId, habilitation_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .set_habilitation(id, habilitation_id)
            .await
    }

    pub async fn soft_delete_base_locale(&self, id: &BaseLocaleId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .soft_delete(id, chrono::Utc::now().timestamp_millis())
            .await
    }

    pub async fn create_voie(&self, bal_id: &BaseLocaleId, nom: &str) -> Result<Voie> {
        let db = self.db.lock().await;
        LibSqlAddressRepository::new(db.connection())
            .create_voie(bal_id, nom)
            .await
    }

    pub async fn create_toponyme(
        &self,
        bal_id: &BaseLocaleId,
        nom: &str,
        parcelles: &[String],
        positions: &[Position],
    ) -> Result<Toponyme> {
        let db = self.db.lock().await;
        LibSqlAddressRepository::new(db.connection())
            .create_toponyme(bal_id, nom, parcelles, positions)
            .await
    }

    pub async fn create_numero(&self, bal_id: &BaseLocaleId, numero: &NewNumero) -> Result<Numero> {
        let db = self.db.lock().await;
        LibSqlAddressRepository::new(db.connection())
            .create_numero(bal_id, numero)
            .await
    }

    /// Soft-delete a numéro and bump its BaseLocale.
    pub async fn delete_numero(&self, id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlAddressRepository::new(db.connection())
            .delete_numero(id)
            .await
    }

    pub async fn count_active_numeros(&self, bal_id: &BaseLocaleId) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlAddressRepository::new(db.connection())
            .count_active_numeros(bal_id)
            .await
    }

    /// Load the BaseLocale and its active records under one lock.
    pub async fn load_dataset(&self, bal_id: &BaseLocaleId) -> Result<Option<Dataset>> {
        let db = self.db.lock().await;
        LibSqlAddressRepository::new(db.connection())
            .load_dataset(bal_id)
            .await
    }

    pub async fn mark_published(
        &self,
        id: &BaseLocaleId,
        revision_id: &str,
        current_updated: i64,
    ) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .mark_published(id, revision_id, current_updated)
            .await
    }

    pub async fn mark_outdated_if_changed(&self) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .mark_outdated_if_changed()
            .await
    }

    pub async fn list_published_for_commune(&self, commune: &str) -> Result<Vec<BaseLocale>> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .list_published_for_commune(commune)
            .await
    }

    pub async fn mark_synced(&self, id: &BaseLocaleId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .mark_synced(id)
            .await
    }

    pub async fn mark_replaced(&self, id: &BaseLocaleId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .mark_replaced(id)
            .await
    }

    pub async fn list_ready_to_sync(&self, updated_before: i64) -> Result<Vec<BaseLocaleId>> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .list_ready_to_sync(updated_before)
            .await
    }

    /// Returns false when the BaseLocale has no sync record.
    pub async fn set_sync_paused(&self, id: &BaseLocaleId, paused: bool) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .set_sync_paused(id, paused)
            .await
    }

    pub async fn delete_demo_created_before(&self, before: i64) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .delete_demo_created_before(before)
            .await
    }

    pub async fn delete_soft_deleted_before(&self, before: i64) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlBaseLocaleRepository::new(db.connection())
            .delete_soft_deleted_before(before)
            .await
    }

    pub async fn get_cache_value(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        LibSqlCacheRepository::new(db.connection())
            .get_value(key)
            .await
    }

    pub async fn set_cache_value(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlCacheRepository::new(db.connection())
            .set_value(key, value)
            .await
    }

    pub async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        now: i64,
        expires_at: i64,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlCacheRepository::new(db.connection())
            .try_acquire_lease(key, holder, now, expires_at)
            .await
    }

    pub async fn release_lease(&self, key: &str, holder: &str) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlCacheRepository::new(db.connection())
            .release_lease(key, holder)
            .await
    }
}
