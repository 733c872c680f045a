use steward_core::StewardError;
use thiserror::Error;

/// Errors from the forge HTTP layer, classified for the retry policy.
///
/// The coordinator only distinguishes transient from fatal, so every variant
/// answers [`ForgeError::is_transient`]. Auth failures are never transient:
/// a bad token will not get better on retry.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The forge rejected our credentials (HTTP 401/403).
    #[error("forge auth rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Rate limiting or a server-side failure (HTTP 429/5xx).
    #[error("forge transient failure ({status}): {message}")]
    Throttled { status: u16, message: String },

    /// Any other non-2xx response. Usually a misconfigured org or repo name.
    #[error("forge request failed ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request itself failed: DNS, TLS, connect, timeout, or body decode.
    #[error("forge http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A snapshot fetch task could not be joined.
    #[error("forge task error: {0}")]
    Task(String),
}

impl ForgeError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ForgeError::Throttled { .. } => true,
            ForgeError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ForgeError::Auth { .. } | ForgeError::Api { .. } | ForgeError::Task(_) => false,
        }
    }
}

impl From<ForgeError> for StewardError {
    fn from(err: ForgeError) -> Self {
        match &err {
            ForgeError::Auth { .. } => StewardError::Auth(err.to_string()),
            // A hard 4xx means the configured org or repo does not exist as
            // named; retrying will not help.
            ForgeError::Api { .. } => StewardError::Config(err.to_string()),
            ForgeError::Throttled { .. } | ForgeError::Http(_) | ForgeError::Task(_) => {
                StewardError::Transient(err.to_string())
            }
        }
    }
}
