//! Error types for upstream YouTube API calls

/// Any failure of a post-authorization API call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("YouTube API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid YouTube API response: {0}")]
    Decode(String),
}

impl Error {
    /// Upstream HTTP status, when the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short classification used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Http(_) => "transport",
            Error::Api { .. } => "api",
            Error::Decode(_) => "decode",
        }
    }
}

/// Result alias for YouTube API operations.
pub type Result<T> = std::result::Result<T, Error>;
