//! Tidings insight crate - topic discovery over an embedded corpus.
//!
//! Provides:
//! - The `ClusteringEngine` capability and its output contract
//! - A built-in embedding-similarity clusterer
//! - Class-based TF-IDF cluster labels
//! - The `TopicAssembler`, which derives batches and topics from a fit

pub mod assembler;
pub mod cluster;
pub mod error;
pub mod labels;
pub mod types;

pub use assembler::{AssembledTopics, Assembly, TopicAssembler, MIN_DOCUMENTS};
pub use cluster::{ClusteringEngine, SimilarityClusterer};
pub use error::InsightError;
pub use labels::ClassTfIdf;
pub use types::{ClusterId, ClusterSummary, ClusteringOutput, DocumentAssignment};
