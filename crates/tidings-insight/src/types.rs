use std::collections::{BTreeMap, HashMap};

use crate::error::InsightError;

/// Identifier of a non-outlier cluster within one engine output.
pub type ClusterId = u32;

/// The engine's verdict for a single input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentAssignment {
    /// `None` is the outlier bucket: the document has no topic.
    pub cluster: Option<ClusterId>,
    pub is_representative: bool,
}

impl DocumentAssignment {
    pub fn outlier() -> Self {
        Self {
            cluster: None,
            is_representative: false,
        }
    }

    pub fn member(cluster: ClusterId, is_representative: bool) -> Self {
        Self {
            cluster: Some(cluster),
            is_representative,
        }
    }
}

/// Label and size of a non-outlier cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    /// Ordered label tokens; joined with spaces they form the topic name.
    pub label: Vec<String>,
    pub size: usize,
}

/// Everything a clustering engine returns for one fit.
///
/// `assignments` lines up with the input documents. `clusters` never holds
/// an entry for the outlier bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusteringOutput {
    pub assignments: Vec<DocumentAssignment>,
    pub clusters: BTreeMap<ClusterId, ClusterSummary>,
}

impl ClusteringOutput {
    pub fn outlier_count(&self) -> usize {
        self.assignments
            .iter()
            .filter(|a| a.cluster.is_none())
            .count()
    }

    /// True when no document landed in a real cluster.
    pub fn is_outliers_only(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Check the output against the number of input documents: one
    /// assignment per document, every assigned cluster summarised, and each
    /// summary size matching its member count. A representative flag on an
    /// outlier is ignored.
    pub fn validate(&self, documents: usize) -> Result<(), InsightError> {
        if self.assignments.len() != documents {
            return Err(InsightError::InputMismatch {
                expected: documents,
                actual: self.assignments.len(),
            });
        }

        let mut members: HashMap<ClusterId, usize> = HashMap::new();
        for (document, assignment) in self.assignments.iter().enumerate() {
            if let Some(cluster) = assignment.cluster {
                if !self.clusters.contains_key(&cluster) {
                    return Err(InsightError::UnknownCluster { cluster, document });
                }
                *members.entry(cluster).or_insert(0) += 1;
            }
        }

        for (cluster, summary) in &self.clusters {
            let assigned = members.get(cluster).copied().unwrap_or(0);
            if assigned != summary.size {
                return Err(InsightError::Engine(format!(
                    "cluster {cluster} reports size {} but has {assigned} members",
                    summary.size
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(size: usize) -> ClusterSummary {
        ClusterSummary {
            label: vec!["x".to_string()],
            size,
        }
    }

    #[test]
    fn test_validate_accepts_consistent_output() {
        let output = ClusteringOutput {
            assignments: vec![
                DocumentAssignment::member(0, true),
                DocumentAssignment::member(0, false),
                DocumentAssignment::outlier(),
            ],
            clusters: BTreeMap::from([(0, summary(2))]),
        };
        assert!(output.validate(3).is_ok());
        assert_eq!(output.outlier_count(), 1);
        assert!(!output.is_outliers_only());
    }

    #[test]
    fn test_validate_rejects_length_mismatch() {
        let output = ClusteringOutput {
            assignments: vec![DocumentAssignment::outlier()],
            clusters: BTreeMap::new(),
        };
        let err = output.validate(2).unwrap_err();
        assert!(matches!(
            err,
            InsightError::InputMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_cluster() {
        let output = ClusteringOutput {
            assignments: vec![DocumentAssignment::member(7, false)],
            clusters: BTreeMap::new(),
        };
        let err = output.validate(1).unwrap_err();
        assert!(matches!(
            err,
            InsightError::UnknownCluster {
                cluster: 7,
                document: 0
            }
        ));
    }

    #[test]
    fn test_validate_tolerates_representative_outlier() {
        let output = ClusteringOutput {
            assignments: vec![
                DocumentAssignment::member(0, true),
                DocumentAssignment::member(0, false),
                DocumentAssignment {
                    cluster: None,
                    is_representative: true,
                },
            ],
            clusters: BTreeMap::from([(0, summary(2))]),
        };
        assert!(output.validate(3).is_ok());
        assert_eq!(output.outlier_count(), 1);
    }

    #[test]
    fn test_validate_rejects_wrong_size() {
        let output = ClusteringOutput {
            assignments: vec![DocumentAssignment::member(0, false)],
            clusters: BTreeMap::from([(0, summary(3))]),
        };
        assert!(matches!(output.validate(1), Err(InsightError::Engine(_))));
    }
}
