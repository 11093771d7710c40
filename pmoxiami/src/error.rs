//! Error handling for the Xiami client

use thiserror::Error;

/// Result type for pmoxiami
pub type Result<T> = std::result::Result<T, XiamiError>;

/// Errors raised by the Xiami client
#[derive(Error, Debug)]
pub enum XiamiError {
    /// Network failure or timeout. Never retried by the client.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server rejected the app id / app key pair (`FAIL_SYS_PARAMINVALID_ERROR`)
    #[error("Unexpected error, app id or app key mismatch")]
    AppKeyMismatch,

    /// The action requires a logged-in user (`FAIL_BIZ_GLOBAL_NEED_LOGIN`)
    #[error("Authentication required: you need to login first")]
    LoginRequired,

    /// The action has been retired server-side (`FAIL_SYS_WJAS_DENIED`)
    #[error("This API is unavailable anymore: {0}")]
    EndpointRetired(String),

    /// The login action answered with a non-success code
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// The bootstrap response did not carry the `_m_h5_tk` cookie
    #[error("Session token cookie `_m_h5_tk` missing from bootstrap response")]
    MissingTokenCookie,

    /// The body could not be read as a Xiami response envelope
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A non-success code where a success-shaped body is required
    #[error("Unexpected response code {code}: {message}")]
    UnexpectedCode { code: String, message: String },

    /// An expected field was absent from a response body
    #[error("Missing field in response: {0}")]
    MissingField(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl XiamiError {
    /// True for the server-classified conditions that a retry cannot fix
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            XiamiError::AppKeyMismatch
                | XiamiError::LoginRequired
                | XiamiError::EndpointRetired(_)
                | XiamiError::MissingTokenCookie
        )
    }

    /// True when the user has to (re)authenticate
    pub fn is_auth_error(&self) -> bool {
        matches!(self, XiamiError::LoginRequired | XiamiError::LoginFailed(_))
    }

    /// Builds a [`XiamiError::MissingField`] from a JSON path
    pub(crate) fn missing(path: &[&str]) -> Self {
        XiamiError::MissingField(path.join("."))
    }
}

impl From<ureq::Error> for XiamiError {
    fn from(err: ureq::Error) -> Self {
        XiamiError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for XiamiError {
    fn from(err: std::io::Error) -> Self {
        XiamiError::Transport(err.to_string())
    }
}
