use thiserror::Error;

/// Failures raised by the review pipeline.
///
/// Every variant is fatal for the operation that produced it; nothing in the
/// pipeline retries. `main` converts these into `anyhow::Error` at the edge.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// A required setting is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An API key expected in the environment was not set.
    #[error("credential missing: {0} is not set")]
    CredentialMissing(String),

    /// The source-control backend rejected the request or no token was supplied.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The requested service is declared but not built.
    #[error("{0} is not implemented yet")]
    UnsupportedBackend(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The local git invocation failed.
    #[error("git diff failed: {0}")]
    DiffTool(String),

    /// A review session operation was called from the wrong state.
    #[error("invalid session state: {0}")]
    InvalidState(String),
}
