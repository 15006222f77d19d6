//! Database layer for BAL publication

mod address_repository;
mod base_locale_repository;
mod cache_repository;
mod connection;
mod migrations;

pub use address_repository::{AddressRepository, LibSqlAddressRepository, NewNumero};
pub use base_locale_repository::{BaseLocaleRepository, LibSqlBaseLocaleRepository};
pub use cache_repository::{CacheRepository, LibSqlCacheRepository};
pub use connection::{Database, ReplicaConfig};
