//! Error types for the database manager.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by database, script and configuration operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not connected to a database")]
    NotConnected,

    #[error("No database path specified")]
    NoPath,

    #[error("Database {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("File {0} not found")]
    FileNotFound(PathBuf),

    #[error("Unknown schema template '{0}'. Run `sql-pancake templates` to see the bundled ones.")]
    UnknownTemplate(String),

    #[error("SQL error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short stable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "E001",
            Self::NoPath => "E002",
            Self::AlreadyExists(_) => "E003",
            Self::FileNotFound(_) => "E004",
            Self::UnknownTemplate(_) => "E005",
            Self::Sqlite(_) => "E100",
            Self::Config(_) => "E200",
            Self::InvalidInput(_) => "E300",
            Self::Io(_) => "E900",
        }
    }

    /// Suggested next step for the user, when there is an obvious one.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NotConnected => Some("open a database first".to_string()),
            Self::AlreadyExists(path) => Some(format!(
                "sql-pancake create {} --force",
                path.display()
            )),
            Self::UnknownTemplate(_) => Some("sql-pancake templates".to_string()),
            Self::Config(_) => Some("sql-pancake config reset".to_string()),
            _ => None,
        }
    }
}
