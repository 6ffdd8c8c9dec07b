use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the fetch adapter, the reconciliation engine and the
/// season-scoped sync entry points. Nothing in the core swallows these; the
/// HTTP layer and the CLI decide how to present them.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The season id has no row. Raised before any upstream or storage work.
    #[error("Failed to get season with id={0}")]
    SeasonNotFound(i32),

    /// The provider answered 2xx but flagged the request parameters.
    /// Displays the provider messages joined with `"; "`, nothing else.
    #[error("{0}")]
    UpstreamValidation(String),

    /// A record broke a shape assumption (unparseable round, bad date,
    /// missing required record). The whole batch is abandoned.
    #[error("malformed upstream data: {0}")]
    MalformedUpstreamData(String),

    /// Any failure from the storage port, passed through untouched.
    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream error (status {status}): {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

impl SyncError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        SyncError::MalformedUpstreamData(msg.into())
    }

    /// Postgres SQLSTATE of the underlying storage error, if there is one.
    pub fn db_code(&self) -> Option<String> {
        match self {
            SyncError::Storage(sqlx::Error::Database(db)) => db.code().map(|c| c.into_owned()),
            _ => None,
        }
    }
}
