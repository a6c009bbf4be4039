use thiserror::Error;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl DomainError {
    /// Whether this error is likely transient (store unreachable, deadline hit)
    /// and the operation may succeed if the caller retries it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::StorageUnavailable(_) | DomainError::Timeout(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    Decode(String),
}

impl From<InfraError> for DomainError {
    fn from(e: InfraError) -> Self {
        DomainError::StorageUnavailable(e.to_string())
    }
}
