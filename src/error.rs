use thiserror::Error;

/// Main error type for fathom operations
#[derive(Error, Debug)]
pub enum FathomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type alias for fathom operations
pub type Result<T> = std::result::Result<T, FathomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FathomError::Storage("shard 3 is not open".to_string());
        assert_eq!(err.to_string(), "storage error: shard 3 is not open");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FathomError = io.into();
        assert!(matches!(err, FathomError::Io(_)));
    }
}
