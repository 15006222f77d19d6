use crate::error::Result;
use crate::services::DatabaseService;

/// Flag SYNCED BaseLocales edited since their last published snapshot.
///
/// Local only, safe to run as often as wanted.
pub async fn detect_outdated(db: &DatabaseService) -> Result<u64> {
    let updated = db.mark_outdated_if_changed().await?;
    if updated > 0 {
        tracing::info!(task = "detect_outdated", updated, "Marked BaseLocales outdated");
    } else {
        tracing::debug!(task = "detect_outdated", "No outdated BaseLocale");
    }
    Ok(updated)
}
