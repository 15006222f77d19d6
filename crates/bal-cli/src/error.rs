use thiserror::Error;

use bal_core::config::ConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] bal_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
