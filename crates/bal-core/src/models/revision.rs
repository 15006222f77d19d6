//! Revision model (owned by the Api Depot)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File type under which the canonical CSV is stored on a revision
pub const BAL_FILE_TYPE: &str = "bal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionStatus {
    Pending,
    Published,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionFile {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Result of server-side validation, attached by `compute`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionValidation {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// One version of a commune's dataset as known to the depot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub code_commune: String,
    pub status: RevisionStatus,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub files: Vec<RevisionFile>,
    #[serde(default)]
    pub validation: Option<RevisionValidation>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Revision {
    /// Hash of the BAL file stored on this revision, if any.
    pub fn bal_file_hash(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.kind == BAL_FILE_TYPE)
            .and_then(|file| file.hash.as_deref())
    }
}

/// Context sent with a new revision so the depot can trace its author
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionContext {
    pub nom_complet: Option<String>,
    pub organisation: Option<String>,
    pub extras: RevisionExtras,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionExtras {
    pub bal_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bal_file_hash_ignores_other_files() {
        let payload = r#"{
            "_id": "rev-1",
            "codeCommune": "54084",
            "status": "published",
            "ready": true,
            "current": true,
            "files": [
                {"type": "attachment", "hash": "aaa"},
                {"type": "bal", "hash": "bbb", "size": 120}
            ],
            "publishedAt": "2024-03-01T10:00:00.000Z"
        }"#;

        let revision: Revision = serde_json::from_str(payload).unwrap();
        assert_eq!(revision.bal_file_hash(), Some("bbb"));
        assert!(revision.current);
        assert!(revision.validation.is_none());
    }

    #[test]
    fn missing_files_have_no_hash() {
        let payload = r#"{"_id": "rev-2", "codeCommune": "54084", "status": "pending"}"#;
        let revision: Revision = serde_json::from_str(payload).unwrap();
        assert_eq!(revision.bal_file_hash(), None);
        assert!(!revision.ready);
    }
}
