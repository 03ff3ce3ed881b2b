//! Unified error types for lantern.
//!
//! Only [`Error::InstallFailed`] is allowed to abort a lifecycle phase.
//! Everything else is caught at the point of occurrence and turned into a
//! fallback response or a log line.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the offline cache manager.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL, unknown message).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// One or more core precache entries could not be fetched or stored.
    #[error("INSTALL_FAILED: {}", .0.join(", "))]
    InstallFailed(Vec<String>),

    /// Transport-level failure (connection refused, DNS, offline).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response where a 200 was required.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Invalid URL or URL outside the worker scope.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Lifecycle event not valid for the worker's current state.
    #[error("INVALID_STATE: {event} while {state}")]
    InvalidState { state: String, event: String },

    /// Activation requested with no installed worker waiting.
    #[error("NO_WAITING_WORKER")]
    NoWaitingWorker,

    /// No worker is active for the registration.
    #[error("NO_ACTIVE_WORKER")]
    NoActiveWorker,

    /// Deleting a stale namespace failed.
    #[error("EVICTION_FAILED: {0}")]
    EvictionFailed(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

impl Error {
    /// Whether this error must abort the lifecycle phase that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InstallFailed(_))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InstallFailed(_) => (-32000, err.to_string()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32004, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::HttpError(msg) => (-32008, msg.clone()),
            Error::InvalidState { .. } => (-32009, err.to_string()),
            Error::NoWaitingWorker => (-32010, "No installed worker is waiting".to_string()),
            Error::NoActiveWorker => (-32011, "No worker is active".to_string()),
            Error::EvictionFailed(msg) => (-32012, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InstallFailed(vec!["https://app.test/a.html (status 404)".to_string()]);
        assert!(err.to_string().starts_with("INSTALL_FAILED"));
        assert!(err.to_string().contains("/a.html"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = Error::InvalidState { state: "active".into(), event: "install".into() };
        assert_eq!(err.to_string(), "INVALID_STATE: install while active");
    }

    #[test]
    fn test_only_install_failure_is_fatal() {
        assert!(Error::InstallFailed(Vec::new()).is_fatal());
        assert!(!Error::Network("offline".into()).is_fatal());
        assert!(!Error::EvictionFailed("lantern-pages-1".into()).is_fatal());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::NoWaitingWorker;
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32010);
    }
}
