use thiserror::Error;

/// Top-level error type for the Stockist system.
///
/// The variants encode the failure taxonomy that drives retry and containment
/// decisions: `Transport` errors are transient and eligible for a single retry
/// at the transport layer; `MalformedOutput` is never retried (re-sending the
/// same prompt rarely fixes a structurally invalid response); the remaining
/// variants are fatal for the operation that raised them. Subsystem crates
/// implement `From<StockistError>` for their own error types so that the `?`
/// operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StockistError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Catalog store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StockistError {
    /// Whether this failure is transient and worth one retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StockistError::Transport(_))
    }
}

impl From<toml::de::Error> for StockistError {
    fn from(err: toml::de::Error) -> Self {
        StockistError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StockistError {
    fn from(err: toml::ser::Error) -> Self {
        StockistError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for StockistError {
    fn from(err: serde_json::Error) -> Self {
        StockistError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Stockist operations.
pub type Result<T> = std::result::Result<T, StockistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StockistError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = StockistError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");

        let err = StockistError::MalformedOutput("not JSON".to_string());
        assert_eq!(err.to_string(), "Malformed model output: not JSON");

        let err = StockistError::StoreUnavailable("timed out".to_string());
        assert_eq!(err.to_string(), "Catalog store unavailable: timed out");
    }

    #[test]
    fn test_dimension_mismatch_display() {
        let err = StockistError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 768, got 384"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(StockistError::Transport("timeout".into()).is_transient());
        assert!(!StockistError::MalformedOutput("bad".into()).is_transient());
        assert!(!StockistError::DimensionMismatch {
            expected: 768,
            actual: 10
        }
        .is_transient());
        assert!(!StockistError::StoreUnavailable("down".into()).is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StockistError = io_err.into();
        assert!(matches!(err, StockistError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(err.is_err());
        let err: StockistError = err.unwrap_err().into();
        assert!(matches!(err, StockistError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(err.is_err());
        let err: StockistError = err.unwrap_err().into();
        assert!(matches!(err, StockistError::Serialization(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(StockistError::Search("index empty".to_string()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_error_debug_impl() {
        let err = StockistError::MalformedOutput("test debug".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("MalformedOutput"));
        assert!(debug_str.contains("test debug"));
    }
}
