//! Detection of revisions published by someone else for our communes

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::api_depot::RevisionApi;
use crate::error::Result;
use crate::services::DatabaseService;

/// Cache key of the `publishedSince` cursor
pub const PUBLISHED_SINCE_KEY: &str = "detect_conflict.published_since";

/// Reconcile every commune with a revision published since the last run.
///
/// The cursor moves to the time captured before listing, after the batch
/// is processed, so nothing published mid-run is missed. A failed listing
/// leaves it untouched. Returns the number of BaseLocales examined.
pub async fn detect_conflict(db: &DatabaseService, revisions: &dyn RevisionApi) -> Result<u64> {
    let since = load_cursor(db).await?;
    let now = Utc::now();

    let published = revisions.get_current_revisions(since).await?;
    let communes: BTreeSet<String> = published
        .into_iter()
        .map(|revision| revision.code_commune)
        .collect();

    let mut examined = 0;
    for commune in &communes {
        match reconcile_commune(db, revisions, commune).await {
            Ok(count) => examined += count,
            Err(error) => {
                tracing::warn!(
                    task = "detect_conflict",
                    commune = %commune,
                    "Failed to reconcile commune: {}",
                    error
                );
            }
        }
    }

    db.set_cache_value(
        PUBLISHED_SINCE_KEY,
        &now.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
    .await?;

    tracing::info!(
        task = "detect_conflict",
        communes = communes.len(),
        examined,
        "Conflict detection done"
    );
    Ok(examined)
}

async fn load_cursor(db: &DatabaseService) -> Result<DateTime<Utc>> {
    let Some(raw) = db.get_cache_value(PUBLISHED_SINCE_KEY).await? else {
        return Ok(DateTime::UNIX_EPOCH);
    };

    match DateTime::parse_from_rfc3339(&raw) {
        Ok(cursor) => Ok(cursor.with_timezone(&Utc)),
        Err(error) => {
            tracing::warn!(
                task = "detect_conflict",
                "Ignoring unreadable cursor '{}': {}",
                raw,
                error
            );
            Ok(DateTime::UNIX_EPOCH)
        }
    }
}

async fn reconcile_commune(
    db: &DatabaseService,
    revisions: &dyn RevisionApi,
    commune: &str,
) -> Result<u64> {
    let base_locales = db.list_published_for_commune(commune).await?;
    if base_locales.is_empty() {
        return Ok(0);
    }

    let Some(current) = revisions.get_current_revision(commune).await? else {
        tracing::debug!(
            task = "detect_conflict",
            commune = %commune,
            "No current revision, skipping"
        );
        return Ok(0);
    };

    for base_locale in &base_locales {
        if base_locale.last_uploaded_revision_id() == Some(current.id.as_str()) {
            db.mark_synced(&base_locale.id).await?;
        } else {
            tracing::info!(
                task = "detect_conflict",
                bal_id = %base_locale.id,
                commune = %commune,
                revision_id = %current.id,
                "BaseLocale replaced by another revision"
            );
            db.mark_replaced(&base_locale.id).await?;
        }
    }

    Ok(u64::try_from(base_locales.len()).unwrap_or(u64::MAX))
}
