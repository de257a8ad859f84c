use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("{0}")]
    Custom(String),
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Custom(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Custom(s.to_string())
    }
}

/// Ошибка доставки одной единицы отправки.
/// Transient допускает немедленный повтор, Permanent означает отказ
/// от поста целиком до следующего прохода.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Transient delivery error: {0}")]
    Transient(String),

    #[error("Permanent delivery error: {0}")]
    Permanent(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cache file is corrupted: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
