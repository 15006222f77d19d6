//! Garbage collection of demo and soft-deleted BaseLocales

use std::time::Duration;

use crate::error::Result;
use crate::services::DatabaseService;
use crate::util::now_millis;

/// Demo BaseLocales older than this are removed
pub const DEMO_RETENTION: Duration = Duration::from_secs(30 * 24 * 3_600);
/// Soft-deleted BaseLocales are kept this long after deletion
pub const SOFT_DELETE_RETENTION: Duration = Duration::from_secs(365 * 24 * 3_600);

fn cutoff(now: i64, retention: Duration) -> i64 {
    now.saturating_sub(i64::try_from(retention.as_millis()).unwrap_or(i64::MAX))
}

pub async fn remove_demo_bal(db: &DatabaseService) -> Result<u64> {
    let removed = db
        .delete_demo_created_before(cutoff(now_millis(), DEMO_RETENTION))
        .await?;
    tracing::info!(task = "remove_demo_bal", removed, "Removed demo BaseLocales");
    Ok(removed)
}

pub async fn remove_soft_delete_bal(db: &DatabaseService) -> Result<u64> {
    let removed = db
        .delete_soft_deleted_before(cutoff(now_millis(), SOFT_DELETE_RETENTION))
        .await?;
    tracing::info!(
        task = "remove_soft_delete_bal",
        removed,
        "Removed soft-deleted BaseLocales"
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_subtracts_retention() {
        let retention_ms = i64::try_from(DEMO_RETENTION.as_millis()).unwrap();
        assert_eq!(cutoff(retention_ms + 5, DEMO_RETENTION), 5);
        assert_eq!(cutoff(i64::MIN, SOFT_DELETE_RETENTION), i64::MIN);
    }
}
