//! bal-core - Core library for BAL publication
//!
//! This crate contains the models, the libSQL storage layer, the Api Depot
//! clients and the reconciliation engine shared by the worker (`bal-api`)
//! and the one-shot cron runner (`bal-cron`).

pub mod api_depot;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod geo;
pub mod lock;
pub mod models;
pub mod publication;
pub mod queue;
pub mod scheduler;
pub mod services;
pub mod tasks;
pub mod util;

pub use engine::{Engine, TaskOutcome};
pub use error::{Error, Result};
pub use models::{BaseLocale, BaseLocaleId};
pub use queue::TaskQueue;
pub use services::DatabaseService;
pub use tasks::TaskKind;
