//! Publication orchestrator: pushes one BaseLocale to the Api Depot.

mod mailer;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use mailer::{Mailer, TracingMailer};

use crate::api_depot::{HabilitationApi, RevisionApi};
use crate::error::{Error, Result};
use crate::export::Snapshot;
use crate::models::{
    BaseLocale, BaseLocaleId, BaseLocaleStatus, Habilitation, Revision, RevisionContext,
    RevisionExtras,
};
use crate::services::DatabaseService;

/// Checks an habilitation against the commune it should cover.
///
/// Order matters: status, then expiry, then commune.
pub fn check_habilitation(
    habilitation: &Habilitation,
    commune: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    if !habilitation.is_accepted() {
        return Err(Error::precondition("habilitation not valid"));
    }
    if habilitation.is_expired_at(now) {
        return Err(Error::precondition("habilitation expired"));
    }
    if habilitation.code_commune != commune {
        return Err(Error::precondition("habilitation does not match commune"));
    }
    Ok(())
}

/// Drives the publish protocol for a BaseLocale
#[derive(Clone)]
pub struct Publisher {
    db: DatabaseService,
    habilitations: Arc<dyn HabilitationApi>,
    revisions: Arc<dyn RevisionApi>,
    mailer: Arc<dyn Mailer>,
}

impl Publisher {
    pub fn new(
        db: DatabaseService,
        habilitations: Arc<dyn HabilitationApi>,
        revisions: Arc<dyn RevisionApi>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            habilitations,
            revisions,
            mailer,
        }
    }

    pub const fn habilitations(&self) -> &Arc<dyn HabilitationApi> {
        &self.habilitations
    }

    pub const fn revisions(&self) -> &Arc<dyn RevisionApi> {
        &self.revisions
    }

    /// Publish the BaseLocale, or reuse the current revision when its file
    /// hash matches the local snapshot. Returns the updated BaseLocale.
    pub async fn exec(&self, id: &BaseLocaleId) -> Result<BaseLocale> {
        let base_locale = self
            .db
            .get_base_locale(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("BaseLocale {id}")))?;

        if base_locale.status == BaseLocaleStatus::Demo {
            return Err(Error::precondition("sync not possible for demo BAL"));
        }

        let habilitation = self.resolve_habilitation(&base_locale).await?;

        if self.db.count_active_numeros(id).await? == 0 {
            return Err(Error::precondition("no address in BAL"));
        }

        let dataset = self
            .db
            .load_dataset(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("BaseLocale {id}")))?;
        let snapshot = Snapshot::from_dataset(&dataset);

        let current = self
            .revisions
            .get_current_revision(&base_locale.commune)
            .await?;

        let revision_id = match current {
            Some(revision) if revision.bal_file_hash() == Some(snapshot.hash.as_str()) => {
                tracing::info!(
                    bal_id = %id,
                    commune = %base_locale.commune,
                    revision_id = %revision.id,
                    "Current revision already holds this snapshot, skipping upload"
                );
                revision.id
            }
            _ => {
                self.publish_snapshot(&base_locale, &habilitation, &snapshot)
                    .await?
                    .id
            }
        };

        self.db
            .mark_published(id, &revision_id, snapshot.updated_at)
            .await?;

        let published = self
            .db
            .get_base_locale(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("BaseLocale {id}")))?;

        if base_locale.status == BaseLocaleStatus::Draft {
            if let Err(error) = self.mailer.send_publication_notice(&published).await {
                tracing::warn!(bal_id = %id, "Failed to send publication notice: {}", error);
            }
        }

        Ok(published)
    }

    async fn resolve_habilitation(&self, base_locale: &BaseLocale) -> Result<Habilitation> {
        let Some(habilitation_id) = base_locale.habilitation_id.as_deref() else {
            return Err(Error::precondition("no habilitation attached"));
        };

        let habilitation = self
            .habilitations
            .fetch_habilitation(habilitation_id)
            .await?;
        check_habilitation(&habilitation, &base_locale.commune, Utc::now())?;
        Ok(habilitation)
    }

    async fn publish_snapshot(
        &self,
        base_locale: &BaseLocale,
        habilitation: &Habilitation,
        snapshot: &Snapshot,
    ) -> Result<Revision> {
        let context = RevisionContext {
            nom_complet: None,
            organisation: None,
            extras: RevisionExtras {
                bal_id: base_locale.id.to_string(),
            },
        };

        let revision = self
            .revisions
            .create_revision(&base_locale.commune, &context)
            .await?;
        tracing::debug!(
            bal_id = %base_locale.id,
            revision_id = %revision.id,
            "Created revision"
        );

        let computed = self.revisions.compute_revision(&revision.id).await?;
        if let Some(validation) = computed.validation.filter(|validation| !validation.valid) {
            let details = if validation.errors.is_empty() {
                "invalid data".to_string()
            } else {
                validation.errors.join(", ")
            };
            return Err(Error::precondition(format!(
                "revision validation failed: {details}"
            )));
        }

        self.revisions
            .upload_file(&revision.id, &snapshot.bytes)
            .await?;

        let published = self
            .revisions
            .publish_revision(&revision.id, &habilitation.id)
            .await?;

        tracing::info!(
            bal_id = %base_locale.id,
            commune = %base_locale.commune,
            revision_id = %published.id,
            "Published new revision"
        );
        Ok(published)
    }
}
