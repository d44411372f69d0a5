use thiserror::Error;

/// Main error type for NewsGraph
#[derive(Error, Debug)]
pub enum NewsgraphError {
    /// LLM/embedding provider errors (rate limit, auth, network, bad response)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Graph store errors (malformed query, missing index, connectivity)
    #[error("Graph store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type using NewsgraphError
pub type Result<T> = std::result::Result<T, NewsgraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NewsgraphError::Store("index not found".to_string());
        assert!(err.to_string().contains("Graph store error"));
        assert!(err.to_string().contains("index not found"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NewsgraphError = io_err.into();
        assert!(matches!(err, NewsgraphError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: NewsgraphError = json_err.into();
        assert!(matches!(err, NewsgraphError::Json(_)));
    }
}
