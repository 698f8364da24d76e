// Error types module

use thiserror::Error;

/// Errors a load attempt can run into.
///
/// None of these ever cross the job boundary to a listener: every outcome is
/// reported as SUCCESS/FAILURE/CANCELED, with the raw error recorded in the
/// entry attributes for diagnostics.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// Connection or read failure before a usable HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// 404 or a transport-level not-found without an HTTP response.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// 5xx from the server, including the internal sentinel for "failed
    /// without a real HTTP code".
    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    /// The engine was shut down while the job was waiting to retry.
    #[error("interrupted: {0}")]
    Interrupted(String),
}

/// Errors from the HTTP transport collaborator.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Transport-level not-found, e.g. some stacks surface 404 as an error
    /// instead of a response.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<TransportError> for LoadError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NotFound(msg) => LoadError::NotFound(msg),
            TransportError::Connect(msg) | TransportError::Timeout(msg) => {
                LoadError::Network(msg)
            }
            TransportError::Io(msg) => LoadError::Network(msg),
        }
    }
}
