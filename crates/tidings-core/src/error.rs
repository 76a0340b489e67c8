use chrono::{DateTime, Utc};
use thiserror::Error;

/// Validation failures for the query window.
///
/// These are all raised while resolving configuration, before the pipeline
/// touches the document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("invalid date expression: {expression:?}")]
    InvalidDateExpression { expression: String },

    #[error("start date {start} is after end date {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("limit must be positive, got {0}")]
    NonPositiveLimit(i64),
}

/// Top-level error type for the Tidings system.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for TidingsError` so that the `?` operator works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TidingsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Query window error: {0}")]
    Window(#[from] WindowError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Clustering error: {0}")]
    Clustering(String),

    #[error("Topic id collision: {id} derived for both {first:?} and {second:?}")]
    TopicIdCollision {
        id: String,
        first: String,
        second: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TidingsError {
    /// Whether the error belongs to the configuration-validation family and
    /// therefore occurred before any I/O against the store.
    pub fn is_config(&self) -> bool {
        matches!(self, TidingsError::Config(_) | TidingsError::Window(_))
    }
}

impl From<toml::de::Error> for TidingsError {
    fn from(err: toml::de::Error) -> Self {
        TidingsError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for TidingsError {
    fn from(err: serde_yaml::Error) -> Self {
        TidingsError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TidingsError {
    fn from(err: serde_json::Error) -> Self {
        TidingsError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tidings operations.
pub type Result<T> = std::result::Result<T, TidingsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_display() {
        let err = TidingsError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_window_error_display() {
        let err = WindowError::InvalidDateExpression {
            expression: "now-3x".to_string(),
        };
        assert_eq!(err.to_string(), "invalid date expression: \"now-3x\"");

        let err = WindowError::NonPositiveLimit(0);
        assert_eq!(err.to_string(), "limit must be positive, got 0");

        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = WindowError::InvertedWindow { start, end };
        assert!(err.to_string().contains("is after end date"));
    }

    #[test]
    fn test_window_error_converts_and_is_config() {
        let err: TidingsError = WindowError::NonPositiveLimit(-5).into();
        assert!(matches!(err, TidingsError::Window(_)));
        assert!(err.is_config());
        assert!(!TidingsError::Storage("x".into()).is_config());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TidingsError = io_err.into();
        assert!(matches!(err, TidingsError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: TidingsError = err.unwrap_err().into();
        assert!(matches!(err, TidingsError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: TidingsError = err.unwrap_err().into();
        assert!(matches!(err, TidingsError::Serialization(_)));
    }

    #[test]
    fn test_collision_display_names_both_labels() {
        let err = TidingsError::TopicIdCollision {
            id: "abc".into(),
            first: "ai policy".into(),
            second: "policy ai".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ai policy"));
        assert!(msg.contains("policy ai"));
    }
}
