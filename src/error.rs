use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid registry path '{path}': {reason}")]
    InvalidRegistryPath { path: String, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidKey { field: &'static str, reason: String },

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("project already exists: {0}")]
    ProjectAlreadyExists(String),

    /// Another writer holds the lock on the same key; the caller may retry.
    #[error("write conflict on {0}, retry the operation")]
    Conflict(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The backing store failed. The storage message stays in the source chain only.
    #[error("storage unavailable")]
    StorageUnavailable(#[source] rusqlite::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Attaches the affected key to a lock conflict raised by the store.
    pub(crate) fn on_key(self, key: impl std::fmt::Display) -> Self {
        match self {
            Error::Conflict(_) => Error::Conflict(key.to_string()),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
                Error::Conflict("database".to_string())
            }
            Some(rusqlite::ErrorCode::OperationInterrupted) => Error::Cancelled,
            _ => Error::StorageUnavailable(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
