use thiserror::Error;

#[derive(Debug, Error)]
pub enum StewardError {
    #[error("not initialized: run 'steward init'")]
    NotInitialized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transient platform error: {0}")]
    Transient(String),

    #[error("platform rejected credentials: {0}")]
    Auth(String),

    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("learning degraded: {0}")]
    LearningDegraded(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid repository name '{0}': must be lowercase alphanumeric with hyphens, dots or underscores")]
    InvalidRepoName(String),

    #[error("insight not found: {0}")]
    InsightNotFound(String),

    #[error("outcome log error: {0}")]
    OutcomeLog(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StewardError {
    /// Retryable errors get backoff; everything else fails fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, StewardError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, StewardError>;
