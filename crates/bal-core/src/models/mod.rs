//! Data models for BAL publication

mod address;
mod base_locale;
mod habilitation;
mod revision;

pub use address::{Dataset, Numero, Position, PositionType, RecordId, Toponyme, Voie};
pub use base_locale::{
    is_valid_commune_code, BaseLocale, BaseLocaleId, BaseLocaleStatus, SyncState, SyncStatus,
};
pub use habilitation::{Habilitation, HabilitationStatus};
pub use revision::{
    Revision, RevisionContext, RevisionExtras, RevisionFile, RevisionStatus, RevisionValidation,
    BAL_FILE_TYPE,
};
