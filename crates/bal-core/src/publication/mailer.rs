//! Publication notices.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::BaseLocale;

/// Delivers the notice sent when a BaseLocale is published for the first time
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_publication_notice(&self, base_locale: &BaseLocale) -> Result<()>;
}

/// Records notices in the logs instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send_publication_notice(&self, base_locale: &BaseLocale) -> Result<()> {
        if base_locale.emails.is_empty() {
            tracing::info!(
                bal_id = %base_locale.id,
                commune = %base_locale.commune,
                "BaseLocale published, no recipient for the notice"
            );
            return Ok(());
        }

        tracing::info!(
            bal_id = %base_locale.id,
            commune = %base_locale.commune,
            recipients = %base_locale.emails.join(", "),
            "Publication notice for {}",
            base_locale.nom
        );
        Ok(())
    }
}
