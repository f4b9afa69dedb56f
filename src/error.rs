//! Error types for listkeep
//!
//! Failure categories:
//! - Validation: rejected locally before any remote call
//! - RemoteWrite: the remote store refused or failed a call; state unchanged
//! - PartialCascade: a multi-step remote sequence stopped halfway
//! - Internal: serialization and IO

use thiserror::Error;

use crate::remote::RemoteError;

/// Coarse failure category, used by shells to pick a message style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    RemoteWrite,
    PartialCascade,
    Internal,
}

/// Main error type for listkeep operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    // Remote failures
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Remote store rejected duplicate {table} record {id}")]
    DuplicateRecord { table: String, id: String },

    #[error("Cascade stopped after {completed}: {source}")]
    PartialCascade {
        completed: String,
        #[source]
        source: Box<Error>,
    },

    // Internal
    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Category of this failure
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_)
            | Error::InvalidConfig(_)
            | Error::TaskNotFound(_)
            | Error::GroupNotFound(_) => ErrorCategory::Validation,

            Error::Remote(_) | Error::DuplicateRecord { .. } => ErrorCategory::RemoteWrite,

            Error::PartialCascade { .. } => ErrorCategory::PartialCascade,

            Error::Malformed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => ErrorCategory::Internal,
        }
    }

    /// Short message suitable for a transient notice in the UI.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Validation => self.to_string(),
            ErrorCategory::RemoteWrite => "Couldn't save. Please try again.".to_string(),
            ErrorCategory::PartialCascade => "Something went wrong. Please try again.".to_string(),
            ErrorCategory::Internal => "Unexpected error.".to_string(),
        }
    }

    pub(crate) fn cascade(completed: impl Into<String>, source: Error) -> Self {
        Error::PartialCascade {
            completed: completed.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for listkeep operations
pub type Result<T> = std::result::Result<T, Error>;
