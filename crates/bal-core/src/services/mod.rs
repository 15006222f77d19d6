//! Services shared by the binaries

mod database;

pub use database::DatabaseService;
