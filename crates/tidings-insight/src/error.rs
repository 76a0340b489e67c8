use thiserror::Error;

use tidings_core::error::TidingsError;

use crate::types::ClusterId;

/// Errors raised while clustering a corpus or assembling its topics.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("input mismatch: expected {expected} entries, got {actual}")]
    InputMismatch { expected: usize, actual: usize },

    #[error("document {document} assigned to unknown cluster {cluster}")]
    UnknownCluster { cluster: ClusterId, document: usize },

    #[error("engine error: {0}")]
    Engine(String),

    #[error("topic id {id} derived for both {first:?} and {second:?}")]
    TopicIdCollision {
        id: String,
        first: String,
        second: String,
    },
}

impl From<InsightError> for TidingsError {
    fn from(err: InsightError) -> Self {
        match err {
            InsightError::TopicIdCollision { id, first, second } => {
                TidingsError::TopicIdCollision { id, first, second }
            }
            other => TidingsError::Clustering(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_input_mismatch() {
        let e = InsightError::InputMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(e.to_string(), "input mismatch: expected 3 entries, got 2");
    }

    #[test]
    fn test_error_display_unknown_cluster() {
        let e = InsightError::UnknownCluster {
            cluster: 4,
            document: 9,
        };
        assert_eq!(e.to_string(), "document 9 assigned to unknown cluster 4");
    }

    #[test]
    fn test_collision_keeps_its_kind() {
        let e: TidingsError = InsightError::TopicIdCollision {
            id: "abc".into(),
            first: "cluster 0".into(),
            second: "cluster 1".into(),
        }
        .into();
        assert!(matches!(e, TidingsError::TopicIdCollision { ref id, .. } if id == "abc"));
    }

    #[test]
    fn test_engine_errors_become_clustering() {
        let e: TidingsError = InsightError::Engine("dimension mismatch".into()).into();
        assert!(matches!(e, TidingsError::Clustering(_)));
        assert!(e.to_string().contains("dimension mismatch"));
    }
}
