//! Error types for the fetcher

/// Fetch error type
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    TransportError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    StatusError { url: String, status: u16 },

    #[error("{url} returned an invalid JSON body: {source}")]
    InvalidBody {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

impl FetchError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        FetchError::ConfigError(msg.into())
    }

    pub fn transport(url: &str, source: reqwest::Error) -> Self {
        FetchError::TransportError {
            url: url.to_string(),
            source,
        }
    }

    /// Connection, timeout and request failures are worth another attempt.
    /// An answer from the server, good or bad, is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::TransportError { .. })
    }
}
