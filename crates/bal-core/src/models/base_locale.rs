//! BaseLocale model and its publication state

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

static COMMUNE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{5}|2[AB]\d{3})$").expect("Invalid regex"));

/// A unique identifier for a BaseLocale, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaseLocaleId(Uuid);

impl BaseLocaleId {
    /// Create a new unique BaseLocale ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for BaseLocaleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BaseLocaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BaseLocaleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a BaseLocale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaseLocaleStatus {
    Draft,
    Published,
    Demo,
    Replaced,
}

impl BaseLocaleStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Demo => "demo",
            Self::Replaced => "replaced",
        }
    }
}

impl FromStr for BaseLocaleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "demo" => Ok(Self::Demo),
            "replaced" => Ok(Self::Replaced),
            other => Err(Error::InvalidInput(format!(
                "unknown BaseLocale status '{other}'"
            ))),
        }
    }
}

/// Synchronization status between the local dataset and the depot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// Local changes not yet published
    Outdated,
    /// Local and published state match
    Synced,
    /// A competing revision exists upstream
    Conflict,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outdated => "outdated",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "outdated" => Ok(Self::Outdated),
            "synced" => Ok(Self::Synced),
            "conflict" => Ok(Self::Conflict),
            other => Err(Error::InvalidInput(format!("unknown sync status '{other}'"))),
        }
    }
}

/// Publication bookkeeping owned by the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub status: SyncStatus,
    pub is_paused: bool,
    /// Most recent revision this BaseLocale successfully pushed
    pub last_uploaded_revision_id: Option<String>,
    /// `updated_at` of the BaseLocale when the last published snapshot was taken (Unix ms)
    pub current_updated: Option<i64>,
}

/// One commune's locally-editable address dataset plus its publication state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseLocale {
    pub id: BaseLocaleId,
    pub nom: String,
    /// INSEE code of the commune
    pub commune: String,
    /// Display name of the commune, exported in `commune_nom`
    pub nom_commune: String,
    /// Administrators notified on first publication
    pub emails: Vec<String>,
    pub status: BaseLocaleStatus,
    pub habilitation_id: Option<String>,
    pub ban_id: Option<String>,
    pub sync: Option<SyncState>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Bumped by any mutation of the dataset (Unix ms)
    pub updated_at: i64,
    /// Soft delete timestamp (Unix ms)
    pub deleted_at: Option<i64>,
}

impl BaseLocale {
    /// Create a new draft BaseLocale for a commune
    pub fn new(
        nom: impl Into<String>,
        commune: impl Into<String>,
        nom_commune: impl Into<String>,
    ) -> Result<Self> {
        let commune = commune.into();
        if !is_valid_commune_code(&commune) {
            return Err(Error::InvalidInput(format!(
                "invalid commune code '{commune}'"
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        Ok(Self {
            id: BaseLocaleId::new(),
            nom: nom.into(),
            commune,
            nom_commune: nom_commune.into(),
            emails: Vec::new(),
            status: BaseLocaleStatus::Draft,
            habilitation_id: None,
            ban_id: None,
            sync: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.sync.as_ref().map(|sync| sync.status)
    }

    pub fn last_uploaded_revision_id(&self) -> Option<&str> {
        self.sync
            .as_ref()
            .and_then(|sync| sync.last_uploaded_revision_id.as_deref())
    }
}

/// Check a commune code: five digits, or `2A`/`2B` followed by three digits for Corsica.
pub fn is_valid_commune_code(code: &str) -> bool {
    COMMUNE_CODE.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commune_codes() {
        assert!(is_valid_commune_code("54084"));
        assert!(is_valid_commune_code("2A004"));
        assert!(is_valid_commune_code("97411"));
        assert!(!is_valid_commune_code("2C004"));
        assert!(!is_valid_commune_code("5408"));
        assert!(!is_valid_commune_code("540841"));
    }

    #[test]
    fn new_base_locale_is_draft_without_sync() {
        let bal = BaseLocale::new("BAL de Test", "54084", "Blénod-lès-Toul").unwrap();
        assert_eq!(bal.status, BaseLocaleStatus::Draft);
        assert!(bal.sync.is_none());
        assert_eq!(bal.created_at, bal.updated_at);
    }

    #[test]
    fn new_base_locale_rejects_bad_commune() {
        let err = BaseLocale::new("BAL", "abcde", "Nowhere").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            BaseLocaleStatus::Draft,
            BaseLocaleStatus::Published,
            BaseLocaleStatus::Demo,
            BaseLocaleStatus::Replaced,
        ] {
            assert_eq!(status.as_str().parse::<BaseLocaleStatus>().unwrap(), status);
        }
        assert!("archived".parse::<SyncStatus>().is_err());
    }
}
