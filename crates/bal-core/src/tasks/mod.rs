//! Reconciliation and garbage-collection tasks.
//!
//! Each task is a plain async function over the database service; the
//! queue guarantees they never run concurrently within one process.

mod cleanup;
mod detect_conflict;
mod detect_outdated;
mod sync_outdated;

use std::fmt;
use std::str::FromStr;

pub use cleanup::{remove_demo_bal, remove_soft_delete_bal, DEMO_RETENTION, SOFT_DELETE_RETENTION};
pub use detect_conflict::{detect_conflict, PUBLISHED_SINCE_KEY};
pub use detect_outdated::detect_outdated;
pub use sync_outdated::{sync_outdated, SyncOutcome};

use crate::error::Error;

/// A task runnable by the queue, the scheduler or the cron binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    DetectOutdated,
    DetectConflict,
    SyncOutdated,
    RemoveDemoBal,
    RemoveSoftDeleteBal,
}

impl TaskKind {
    pub const ALL: [Self; 5] = [
        Self::DetectOutdated,
        Self::SyncOutdated,
        Self::RemoveDemoBal,
        Self::RemoveSoftDeleteBal,
        Self::DetectConflict,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DetectOutdated => "detect_outdated",
            Self::DetectConflict => "detect_conflict",
            Self::SyncOutdated => "sync_outdated",
            Self::RemoveDemoBal => "remove_demo_bal",
            Self::RemoveSoftDeleteBal => "remove_soft_delete_bal",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown task '{s}'")))
    }
}
