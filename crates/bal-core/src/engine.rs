//! Wiring of storage, depot clients and tasks behind one handle.

use std::sync::Arc;
use std::time::Duration;

use crate::api_depot::{ApiDepotClient, HabilitationApi, RevisionApi};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{BaseLocale, BaseLocaleId, BaseLocaleStatus, Habilitation};
use crate::publication::{Mailer, Publisher, TracingMailer};
use crate::services::DatabaseService;
use crate::tasks::{self, TaskKind};

/// Counts reported by a task run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutcome {
    pub kind: TaskKind,
    /// Rows changed, examined or published, depending on the task
    pub affected: u64,
    pub failed: u64,
}

/// Publication engine shared by the worker, the API and the cron binary
#[derive(Clone)]
pub struct Engine {
    db: DatabaseService,
    publisher: Publisher,
    sync_debounce: Duration,
}

impl Engine {
    pub fn new(
        db: DatabaseService,
        habilitations: Arc<dyn HabilitationApi>,
        revisions: Arc<dyn RevisionApi>,
        mailer: Arc<dyn Mailer>,
        sync_debounce: Duration,
    ) -> Self {
        let publisher = Publisher::new(db.clone(), habilitations, revisions, mailer);
        Self {
            db,
            publisher,
            sync_debounce,
        }
    }

    /// Build an engine talking to the configured Api Depot
    pub fn from_config(db: DatabaseService, config: &EngineConfig) -> Result<Self> {
        let client = Arc::new(ApiDepotClient::new(&config.api_depot)?);
        Ok(Self::new(
            db,
            client.clone(),
            client,
            Arc::new(TracingMailer),
            config.sync_debounce,
        ))
    }

    pub const fn db(&self) -> &DatabaseService {
        &self.db
    }

    pub async fn run_task(&self, kind: TaskKind) -> Result<TaskOutcome> {
        let outcome = |affected| TaskOutcome {
            kind,
            affected,
            failed: 0,
        };

        match kind {
            TaskKind::DetectOutdated => tasks::detect_outdated(&self.db).await.map(outcome),
            TaskKind::DetectConflict => {
                tasks::detect_conflict(&self.db, self.publisher.revisions().as_ref())
                    .await
                    .map(outcome)
            }
            TaskKind::SyncOutdated => {
                let synced =
                    tasks::sync_outdated(&self.db, &self.publisher, self.sync_debounce).await?;
                Ok(TaskOutcome {
                    kind,
                    affected: synced.published,
                    failed: synced.failed,
                })
            }
            TaskKind::RemoveDemoBal => tasks::remove_demo_bal(&self.db).await.map(outcome),
            TaskKind::RemoveSoftDeleteBal => {
                tasks::remove_soft_delete_bal(&self.db).await.map(outcome)
            }
        }
    }

    /// Publish one BaseLocale now
    pub async fn exec(&self, id: &BaseLocaleId) -> Result<BaseLocale> {
        self.publisher.exec(id).await
    }

    pub async fn pause_sync(&self, id: &BaseLocaleId) -> Result<BaseLocale> {
        self.set_paused(id, true).await
    }

    pub async fn resume_sync(&self, id: &BaseLocaleId) -> Result<BaseLocale> {
        self.set_paused(id, false).await
    }

    async fn set_paused(&self, id: &BaseLocaleId, paused: bool) -> Result<BaseLocale> {
        self.require(id).await?;
        if !self.db.set_sync_paused(id, paused).await? {
            return Err(Error::precondition("BAL has never been published"));
        }
        tracing::info!(bal_id = %id, paused, "Sync pause flag updated");
        self.require(id).await
    }

    /// Request an habilitation for the BaseLocale's commune and attach it
    pub async fn create_habilitation(&self, id: &BaseLocaleId) -> Result<Habilitation> {
        let base_locale = self.require(id).await?;
        if base_locale.status == BaseLocaleStatus::Demo {
            return Err(Error::precondition(
                "habilitation not possible for demo BAL",
            ));
        }

        let habilitation = self
            .publisher
            .habilitations()
            .create_habilitation(&base_locale.commune)
            .await?;
        self.db.set_habilitation(id, &habilitation.id).await?;

        tracing::info!(
            bal_id = %id,
            commune = %base_locale.commune,
            "Attached habilitation {}",
            habilitation.id
        );
        Ok(habilitation)
    }

    async fn require(&self, id: &BaseLocaleId) -> Result<BaseLocale> {
        self.db
            .get_base_locale(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("BaseLocale {id}")))
    }
}
