use thiserror::Error;

/// Errors from model-completion backends.
///
/// These abort the current turn and reach the caller unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The request never got an HTTP response.
    #[error("network: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("provider api: {0}")]
    Api(String),

    /// The provider response could not be decoded.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
