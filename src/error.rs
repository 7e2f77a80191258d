use std::{fmt, io};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[cfg(feature = "service")]
use sqlx::Error as SqlxError;

use crate::properties::{Pid, WorkItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum RelsyncError {
    /// The record is published (Active) and the repository refuses to mutate it directly.
    #[error("Record is published and cannot be modified: {0}")]
    Obstacle(String),
    #[error("Repository backend error: {0}")]
    Backend(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Metadata error: {0}")]
    Metadata(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Search index error: {0}")]
    Index(String),
    #[error("Reconciliation of {parent} incomplete: {} of its work items failed", .failures.len())]
    PartialReconciliation {
        parent: Pid,
        failures: Vec<ItemFailure>,
    },
}

impl RelsyncError {
    /// True when the error only says the target record is in a state that forbids the
    /// mutation. Such failures are recoverable by unpublishing the record first.
    pub fn is_obstacle(&self) -> bool {
        matches!(self, RelsyncError::Obstacle(_))
    }
}

/// A work item that could not be applied, together with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item: WorkItem,
    pub error: RelsyncError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.error)
    }
}

impl From<toml::de::Error> for RelsyncError {
    fn from(src: toml::de::Error) -> RelsyncError {
        RelsyncError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for RelsyncError {
    fn from(src: toml::ser::Error) -> RelsyncError {
        RelsyncError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for RelsyncError {
    fn from(src: JsonError) -> RelsyncError {
        RelsyncError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for RelsyncError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => RelsyncError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => RelsyncError::PermissionDenied,
            _ => RelsyncError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<RegexError> for RelsyncError {
    fn from(x: RegexError) -> Self {
        RelsyncError::Metadata(format!("Regex parse failed: {x}"))
    }
}

#[cfg(feature = "service")]
impl From<SqlxError> for RelsyncError {
    fn from(db_error: SqlxError) -> Self {
        match db_error {
            SqlxError::RowNotFound => RelsyncError::NotFound("database row not found".to_string()),
            other => RelsyncError::Backend(format!("database error: {other:?}")),
        }
    }
}

#[cfg(feature = "service")]
impl From<sqlx::migrate::MigrateError> for RelsyncError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        RelsyncError::Backend(format!("database migration failed: {err}"))
    }
}
