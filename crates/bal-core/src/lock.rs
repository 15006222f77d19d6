//! Cross-process run-lock backed by an expiring lease row.

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::error::Result;
use crate::services::DatabaseService;
use crate::util::now_millis;

/// A held lease; release it with [`RunLock::release`]
#[derive(Debug)]
pub struct RunLock {
    db: DatabaseService,
    key: String,
    holder: String,
}

impl RunLock {
    /// Identifier unique to this process and call
    pub fn new_holder() -> String {
        format!("{}:{}", std::process::id(), Uuid::now_v7())
    }

    /// Take the lease, or `None` while another holder's lease is live
    pub async fn acquire(
        db: &DatabaseService,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<Option<Self>> {
        let now = now_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let acquired = db
            .try_acquire_lease(key, holder, now, now.saturating_add(ttl_ms))
            .await?;

        Ok(acquired.then(|| Self {
            db: db.clone(),
            key: key.to_string(),
            holder: holder.to_string(),
        }))
    }

    /// Returns false when the lease had already expired and been taken over
    pub async fn release(self) -> Result<bool> {
        self.db.release_lease(&self.key, &self.holder).await
    }

    /// Run `work` under the lease `key`; skipped (`None`) when it is held.
    ///
    /// The lease is released whatever `work` returns.
    pub async fn run<T, F, Fut>(
        db: &DatabaseService,
        key: &str,
        ttl: Duration,
        work: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let holder = Self::new_holder();
        let Some(lock) = Self::acquire(db, key, &holder, ttl).await? else {
            tracing::info!(lock = key, "Lock held elsewhere, skipping run");
            return Ok(None);
        };

        let output = work().await;

        match lock.release().await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(lock = key, "Lease expired before release"),
            Err(error) => tracing::error!(lock = key, "Failed to release lease: {}", error),
        }
        Ok(Some(output))
    }
}
