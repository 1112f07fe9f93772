//! Error types for the OAuth exchanges

/// Errors from authorization-code exchange and token refresh.
///
/// Never fatal to the process: callers report them per request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {message}")]
    TokenEndpoint { status: u16, message: String },

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("no refresh token held; the consent flow has not completed")]
    MissingRefreshToken,

    #[error("invalid OAuth endpoint: {0}")]
    InvalidEndpoint(String),
}

impl Error {
    /// Upstream HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TokenEndpoint { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
