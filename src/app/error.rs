use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Normalization error: {0}")]
    Normalization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Errors raised while validating input, before any I/O happened.
    pub fn is_rejection(&self) -> bool {
        matches!(self, CatalogError::InvalidParameter(_))
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = CatalogError::InvalidParameter("hits must be positive".into());
        assert_eq!(err.to_string(), "Invalid parameter: hits must be positive");

        let err = CatalogError::FetchFailed("HTTP 503".into());
        assert_eq!(err.to_string(), "Fetch failed: HTTP 503");

        let err = CatalogError::StorageUnavailable("poisoned lock".into());
        assert_eq!(err.to_string(), "Storage unavailable: poisoned lock");
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_storage_from_rusqlite() {
        let err: CatalogError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, CatalogError::Storage(_)));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_invalid_parameter_is_rejection() {
        assert!(CatalogError::InvalidParameter("x".into()).is_rejection());
        assert!(!CatalogError::FetchFailed("x".into()).is_rejection());
    }
}
