//! Clustering engines.
//!
//! [`ClusteringEngine`] is the capability the pipeline depends on; the
//! built-in [`SimilarityClusterer`] links documents whose embeddings are
//! close and labels the resulting groups with class-based TF-IDF.

use std::collections::BTreeMap;

use tracing::debug;

use tidings_core::config::ClusteringConfig;

use crate::error::InsightError;
use crate::labels::ClassTfIdf;
use crate::types::{ClusterId, ClusterSummary, ClusteringOutput, DocumentAssignment};

/// Assigns each document to a cluster or to the outlier bucket.
///
/// `texts` and `vectors` line up by index. The call is compute-bound and
/// blocking.
pub trait ClusteringEngine: Send + Sync {
    fn fit(&self, texts: &[String], vectors: &[Vec<f32>])
        -> Result<ClusteringOutput, InsightError>;
}

/// Groups documents into topics by embedding similarity.
///
/// Two documents are linked when their cosine similarity is at least
/// `threshold`; connected components of that graph are the clusters.
/// Components smaller than `min_cluster_size` become outliers.
#[derive(Debug, Clone)]
pub struct SimilarityClusterer {
    pub threshold: f32,
    pub min_cluster_size: usize,
    pub representative_docs: usize,
    labeler: ClassTfIdf,
}

impl SimilarityClusterer {
    pub fn new(
        threshold: f32,
        min_cluster_size: usize,
        representative_docs: usize,
        label_words: usize,
    ) -> Self {
        Self {
            threshold,
            min_cluster_size: min_cluster_size.max(1),
            representative_docs: representative_docs.max(1),
            labeler: ClassTfIdf::new(label_words),
        }
    }

    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self::new(
            config.similarity_threshold,
            config.min_cluster_size,
            config.representative_docs,
            config.label_words,
        )
    }

    /// Connected components of the similarity graph, each sorted by index.
    fn components(&self, unit: &[Vec<f32>]) -> Vec<Vec<usize>> {
        let n = unit.len();
        let mut visited = vec![false; n];
        let mut components = Vec::new();
        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            let mut component = Vec::new();
            let mut stack = vec![i];
            while let Some(node) = stack.pop() {
                component.push(node);
                for j in 0..n {
                    if !visited[j] && dot(&unit[node], &unit[j]) >= self.threshold {
                        visited[j] = true;
                        stack.push(j);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// The members nearest the centroid of `members`, best first.
    fn representatives(&self, unit: &[Vec<f32>], members: &[usize]) -> Vec<usize> {
        let dim = unit[members[0]].len();
        let mut centroid = vec![0.0f32; dim];
        for &m in members {
            for (c, v) in centroid.iter_mut().zip(&unit[m]) {
                *c += v;
            }
        }
        normalize(&mut centroid);

        let mut scored: Vec<(usize, f32)> = members
            .iter()
            .map(|&m| (m, dot(&unit[m], &centroid)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(self.representative_docs)
            .map(|(m, _)| m)
            .collect()
    }
}

impl Default for SimilarityClusterer {
    fn default() -> Self {
        Self::from_config(&ClusteringConfig::default())
    }
}

impl ClusteringEngine for SimilarityClusterer {
    fn fit(
        &self,
        texts: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<ClusteringOutput, InsightError> {
        if texts.len() != vectors.len() {
            return Err(InsightError::InputMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        if vectors.is_empty() {
            return Ok(ClusteringOutput::default());
        }

        let dim = vectors[0].len();
        if let Some((index, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
            return Err(InsightError::Engine(format!(
                "document {index} has {} dimensions, expected {dim}",
                v.len()
            )));
        }

        let unit: Vec<Vec<f32>> = vectors
            .iter()
            .map(|v| {
                let mut v = v.clone();
                normalize(&mut v);
                v
            })
            .collect();

        let mut clusters: Vec<Vec<usize>> = self
            .components(&unit)
            .into_iter()
            .filter(|c| c.len() >= self.min_cluster_size)
            .collect();
        // Largest first; equal sizes keep first-member order.
        clusters.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));

        let mut assignments = vec![DocumentAssignment::outlier(); texts.len()];
        for (id, members) in clusters.iter().enumerate() {
            let id = id as ClusterId;
            for &m in members {
                assignments[m] = DocumentAssignment::member(id, false);
            }
            for r in self.representatives(&unit, members) {
                assignments[r].is_representative = true;
            }
        }

        let class_texts: Vec<Vec<&str>> = clusters
            .iter()
            .map(|members| members.iter().map(|&m| texts[m].as_str()).collect())
            .collect();
        let labels = self.labeler.labels(&class_texts);

        let summaries: BTreeMap<ClusterId, ClusterSummary> = clusters
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(id, (members, label))| {
                let label = if label.is_empty() {
                    vec![format!("topic-{id}")]
                } else {
                    label
                };
                (
                    id as ClusterId,
                    ClusterSummary {
                        label,
                        size: members.len(),
                    },
                )
            })
            .collect();

        let output = ClusteringOutput {
            assignments,
            clusters: summaries,
        };
        debug!(
            documents = texts.len(),
            clusters = output.clusters.len(),
            outliers = output.outlier_count(),
            "Clustered corpus"
        );
        Ok(output)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length. Zero vectors stay zero and match nothing.
fn normalize(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn clusterer(min_cluster_size: usize) -> SimilarityClusterer {
        SimilarityClusterer::new(0.9, min_cluster_size, 1, 2)
    }

    #[test]
    fn test_groups_similar_vectors() {
        let docs = texts(&[
            "rates interest bank",
            "storm flooding coast",
            "interest rates inflation",
            "flooding storm evacuations",
            "interest rates markets",
        ]);
        let vectors = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.99, 0.05],
            vec![0.02, 1.0],
            vec![1.0, 0.01],
        ];

        let output = clusterer(2).fit(&docs, &vectors).unwrap();
        assert!(output.validate(5).is_ok());
        assert_eq!(output.clusters.len(), 2);
        // The larger cluster gets id 0.
        assert_eq!(output.clusters[&0].size, 3);
        assert_eq!(output.clusters[&1].size, 2);
        assert_eq!(output.clusters[&0].label, vec!["interest", "rates"]);
        for i in [0, 2, 4] {
            assert_eq!(output.assignments[i].cluster, Some(0));
        }
        for i in [1, 3] {
            assert_eq!(output.assignments[i].cluster, Some(1));
        }
        let reps = output
            .assignments
            .iter()
            .filter(|a| a.is_representative)
            .count();
        assert_eq!(reps, 2);
    }

    #[test]
    fn test_small_components_become_outliers() {
        let docs = texts(&["a1 alpha", "a2 alpha", "lonely"]);
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];

        let output = clusterer(2).fit(&docs, &vectors).unwrap();
        assert_eq!(output.clusters.len(), 1);
        assert_eq!(output.assignments[2], DocumentAssignment::outlier());
        assert_eq!(output.outlier_count(), 1);
    }

    #[test]
    fn test_all_outliers() {
        let docs = texts(&["one", "two"]);
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let output = clusterer(2).fit(&docs, &vectors).unwrap();
        assert!(output.is_outliers_only());
        assert_eq!(output.outlier_count(), 2);
    }

    #[test]
    fn test_rejects_mismatched_dimensions() {
        let docs = texts(&["one", "two"]);
        let vectors = vec![vec![1.0, 0.0], vec![1.0]];
        let err = clusterer(1).fit(&docs, &vectors).unwrap_err();
        assert!(matches!(err, InsightError::Engine(_)));
    }

    #[test]
    fn test_rejects_text_vector_mismatch() {
        let err = clusterer(1).fit(&texts(&["one"]), &[]).unwrap_err();
        assert!(matches!(err, InsightError::InputMismatch { .. }));
    }

    #[test]
    fn test_empty_input() {
        let output = clusterer(1).fit(&[], &[]).unwrap();
        assert!(output.assignments.is_empty());
        assert!(output.is_outliers_only());
    }

    #[test]
    fn test_unlabelable_cluster_gets_fallback_label() {
        let docs = texts(&["the and", "of to"]);
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let output = clusterer(2).fit(&docs, &vectors).unwrap();
        assert_eq!(output.clusters[&0].label, vec!["topic-0"]);
    }

    #[test]
    fn test_is_deterministic() {
        let docs = texts(&["x alpha", "y alpha", "z beta", "w beta"]);
        let vectors = vec![
            vec![1.0, 0.0],
            vec![0.95, 0.1],
            vec![0.0, 1.0],
            vec![0.1, 0.95],
        ];
        let c = clusterer(2);
        assert_eq!(c.fit(&docs, &vectors).unwrap(), c.fit(&docs, &vectors).unwrap());
    }
}
