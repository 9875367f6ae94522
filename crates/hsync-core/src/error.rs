use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl SyncError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "CONFIG_ERROR",
            SyncError::InvalidInput(_) => "INVALID_INPUT",
            SyncError::RateLimited { .. } => "RATE_LIMITED",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
