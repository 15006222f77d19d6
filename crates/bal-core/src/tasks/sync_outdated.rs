use std::time::Duration;

use crate::error::Result;
use crate::publication::Publisher;
use crate::services::DatabaseService;
use crate::util::now_millis;

/// Counts from one SyncOutdated run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub published: u64,
    pub failed: u64,
}

/// Republish OUTDATED, unpaused BaseLocales left untouched for `debounce`.
///
/// A failure on one BaseLocale is logged and the batch moves on.
pub async fn sync_outdated(
    db: &DatabaseService,
    publisher: &Publisher,
    debounce: Duration,
) -> Result<SyncOutcome> {
    let debounce_ms = i64::try_from(debounce.as_millis()).unwrap_or(i64::MAX);
    let ids = db
        .list_ready_to_sync(now_millis().saturating_sub(debounce_ms))
        .await?;

    let mut outcome = SyncOutcome::default();
    for id in &ids {
        match publisher.exec(id).await {
            Ok(_) => outcome.published += 1,
            Err(error) => {
                outcome.failed += 1;
                tracing::warn!(
                    task = "sync_outdated",
                    bal_id = %id,
                    "Failed to sync BaseLocale: {}",
                    error
                );
            }
        }
    }

    tracing::info!(
        task = "sync_outdated",
        published = outcome.published,
        failed = outcome.failed,
        "Outdated BaseLocales synced"
    );
    Ok(outcome)
}
