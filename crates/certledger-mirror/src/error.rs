//! Mirror client error types.

/// Errors that can occur when querying the mirror.
///
/// Most query paths deliberately fold these into "no data yet"; only
/// [`MirrorQuery::get_transaction`](crate::MirrorQuery::get_transaction) surfaces them,
/// and only for unexpected HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mirror answered with a status other than success or not-found.
    #[error("mirror API error: {status} - {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
