use thiserror::Error;
use windlight::WindlightError;

/// Error types for the windlight CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Windlight(#[from] WindlightError),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Failed to parse config file '{path}': {message}")]
    ConfigParse { path: String, message: String },

    #[error("Watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;
