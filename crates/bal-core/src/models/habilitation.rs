//! Habilitation model (owned by the Api Depot)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an habilitation as reported by the depot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabilitationStatus {
    Pending,
    Accepted,
    Rejected,
    #[serde(other)]
    Other,
}

/// An externally-issued authorization to publish a commune's addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habilitation {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub code_commune: String,
    pub status: HabilitationStatus,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email_commune: Option<String>,
}

impl Habilitation {
    pub fn is_accepted(&self) -> bool {
        self.status == HabilitationStatus::Accepted
    }

    /// An habilitation without an expiry date never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}
