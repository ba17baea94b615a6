//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration at {0:?}")]
    NotFound(PathBuf),

    #[error("Cannot parse {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("${{{0}}} is referenced but not set")]
    EnvVarNotSet(String),

    /// The validator reported errors; the first one is carried for display.
    #[error("{count} validation error(s), first: {first}")]
    Validation { count: usize, first: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
