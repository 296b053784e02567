use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LookupError>;

/// Why a lookup could not be answered by the store.
///
/// Every one of these is absorbed into an empty result; only the
/// observability channel sees the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    StoreMissing,
    OpenFailed,
    Corrupt,
    TableMissing,
    DeadlineExceeded,
    QueryFailed,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::StoreMissing => "store_missing",
            UnavailableReason::OpenFailed => "open_failed",
            UnavailableReason::Corrupt => "corrupt",
            UnavailableReason::TableMissing => "table_missing",
            UnavailableReason::DeadlineExceeded => "deadline_exceeded",
            UnavailableReason::QueryFailed => "query_failed",
        }
    }
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LookupError {
    /// Classify a failure that happened while talking to the store.
    pub fn unavailable_reason(&self) -> UnavailableReason {
        match self {
            LookupError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                UnavailableReason::StoreMissing
            }
            LookupError::Io(_) => UnavailableReason::OpenFailed,
            LookupError::Sqlite(e) => classify(e),
            _ => UnavailableReason::QueryFailed,
        }
    }
}

/// Map a rusqlite error onto the unavailability taxonomy.
pub fn classify(err: &rusqlite::Error) -> UnavailableReason {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) => match e.code {
            ErrorCode::CannotOpen
            | ErrorCode::PermissionDenied
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::ReadOnly => UnavailableReason::OpenFailed,
            ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt => UnavailableReason::Corrupt,
            ErrorCode::OperationInterrupted => UnavailableReason::DeadlineExceeded,
            _ if msg
                .as_deref()
                .is_some_and(|m| m.starts_with("no such table")) =>
            {
                UnavailableReason::TableMissing
            }
            _ => UnavailableReason::QueryFailed,
        },
        _ => UnavailableReason::QueryFailed,
    }
}
