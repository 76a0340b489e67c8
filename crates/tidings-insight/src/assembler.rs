//! Turns clustering output into a topic batch, its topics, and the
//! per-article membership updates to apply.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use tidings_core::identity;
use tidings_core::types::{Article, ArticleTopicRef, QueryWindow, Topic, TopicArticle, TopicBatch};

use crate::error::InsightError;
use crate::types::{ClusterId, ClusteringOutput};

/// Fewest documents a run needs before topics are meaningful.
pub const MIN_DOCUMENTS: usize = 2;

/// The entities produced by one successful assembly.
#[derive(Debug, Clone)]
pub struct AssembledTopics<'a> {
    pub batch: TopicBatch,
    /// One per non-outlier cluster, in cluster id order.
    pub topics: Vec<Topic>,
    /// Membership updates for every clustered article, in corpus order.
    pub pending: Vec<(&'a Article, ArticleTopicRef)>,
}

#[derive(Debug, Clone)]
pub enum Assembly<'a> {
    Assembled(AssembledTopics<'a>),
    /// Nothing worth writing: too few documents or outliers only.
    InsufficientSignal(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TopicAssembler;

impl TopicAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Build the batch and topics for `window` from `output`.
    ///
    /// `articles` must be the corpus the engine was fitted on, in the same
    /// order. Two clusters whose names derive the same topic id abort the
    /// assembly with [`InsightError::TopicIdCollision`].
    pub fn assemble<'a>(
        &self,
        window: &QueryWindow,
        output: &ClusteringOutput,
        articles: &'a [Article],
        now: DateTime<Utc>,
    ) -> Result<Assembly<'a>, InsightError> {
        if articles.len() < MIN_DOCUMENTS {
            return Ok(Assembly::InsufficientSignal(format!(
                "corpus has {} document(s), need at least {}",
                articles.len(),
                MIN_DOCUMENTS
            )));
        }

        output.validate(articles.len())?;

        if output.is_outliers_only() {
            return Ok(Assembly::InsufficientSignal(format!(
                "all {} documents are outliers",
                articles.len()
            )));
        }

        let mut topics: Vec<Topic> = Vec::with_capacity(output.clusters.len());
        let mut by_cluster: HashMap<ClusterId, usize> = HashMap::new();
        let mut by_id: HashMap<String, ClusterId> = HashMap::new();
        let batch_id = identity::batch_id(window.start(), window.end());

        for (&cluster, summary) in &output.clusters {
            let name = summary.label.join(" ");
            let id = identity::topic_id(&name, window.start(), window.end());

            if let Some(&previous) = by_id.get(&id) {
                return Err(InsightError::TopicIdCollision {
                    id,
                    first: format!("cluster {previous}: {}", topics[by_cluster[&previous]].name),
                    second: format!("cluster {cluster}: {name}"),
                });
            }
            by_id.insert(id.clone(), cluster);
            by_cluster.insert(cluster, topics.len());

            topics.push(Topic {
                id,
                batch_id: batch_id.clone(),
                batch_query: window.clone(),
                create_time: now,
                name,
                count: summary.size as u64,
                representative_articles: Vec::new(),
            });
        }

        let mut pending = Vec::new();
        for (article, assignment) in articles.iter().zip(&output.assignments) {
            let Some(cluster) = assignment.cluster else {
                continue;
            };
            // validate() guarantees every assigned cluster has a topic.
            let topic = &mut topics[by_cluster[&cluster]];
            if assignment.is_representative {
                topic.representative_articles.push(TopicArticle::from(article));
            }
            pending.push((article, topic.article_ref()));
        }

        let article_count = topics.iter().map(|t| t.count).sum();
        let batch = TopicBatch::new(window.clone(), now, article_count, topics.len() as u64);

        info!(
            batch_id = %batch.id,
            topic_count = batch.topic_count,
            article_count = batch.article_count,
            outliers = output.outlier_count(),
            "Assembled topics"
        );

        Ok(Assembly::Assembled(AssembledTopics {
            batch,
            topics,
            pending,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterSummary, DocumentAssignment};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn window() -> QueryWindow {
        QueryWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            8000,
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap()
    }

    fn articles(n: usize) -> Vec<Article> {
        let start = window().start();
        (0..n)
            .map(|i| Article {
                id: format!("a{i}"),
                url: format!("https://news.example/{i}"),
                image: None,
                publish_date: start + Duration::minutes(i as i64),
                author: vec!["Desk".to_string()],
                title: vec![format!("Story {i}")],
                paragraphs: vec!["Body".to_string()],
                embeddings: vec![0.0; 4],
            })
            .collect()
    }

    fn summary(label: &[&str], size: usize) -> ClusterSummary {
        ClusterSummary {
            label: label.iter().map(|s| s.to_string()).collect(),
            size,
        }
    }

    /// 500 documents: clusters of 120, 80 and 50, the rest outliers.
    /// Every tenth member of a cluster is representative.
    fn scenario_output() -> ClusteringOutput {
        let mut assignments = Vec::with_capacity(500);
        for (cluster, size) in [(0u32, 120usize), (1, 80), (2, 50)] {
            for i in 0..size {
                assignments.push(DocumentAssignment::member(cluster, i % 10 == 0));
            }
        }
        assignments.resize(500, DocumentAssignment::outlier());
        ClusteringOutput {
            assignments,
            clusters: BTreeMap::from([
                (0, summary(&["ai", "policy"], 120)),
                (1, summary(&["energy", "prices"], 80)),
                (2, summary(&["election", "polls"], 50)),
            ]),
        }
    }

    fn assembled(assembly: Assembly<'_>) -> AssembledTopics<'_> {
        match assembly {
            Assembly::Assembled(a) => a,
            Assembly::InsufficientSignal(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_scenario_counts() {
        let corpus = articles(500);
        let output = scenario_output();
        let result = assembled(
            TopicAssembler::new()
                .assemble(&window(), &output, &corpus, now())
                .unwrap(),
        );

        assert_eq!(result.batch.topic_count, 3);
        assert_eq!(result.batch.article_count, 250);
        assert_eq!(result.topics.len(), 3);
        assert_eq!(result.pending.len(), 250);

        let sum: u64 = result.topics.iter().map(|t| t.count).sum();
        assert_eq!(sum, result.batch.article_count);

        // Outlier documents are the last 250 and get no reference.
        assert!(result
            .pending
            .iter()
            .all(|(a, _)| a.id[1..].parse::<usize>().unwrap() < 250));
    }

    #[test]
    fn test_topic_fields_and_ids() {
        let corpus = articles(500);
        let w = window();
        let result = assembled(
            TopicAssembler::new()
                .assemble(&w, &scenario_output(), &corpus, now())
                .unwrap(),
        );

        let topic = &result.topics[0];
        assert_eq!(topic.name, "ai policy");
        assert_eq!(topic.count, 120);
        assert_eq!(topic.id, identity::topic_id("ai policy", w.start(), w.end()));
        assert_eq!(topic.batch_id, result.batch.id);
        assert_eq!(topic.batch_query, w);
        assert_eq!(topic.create_time, now());
        assert_eq!(result.batch.id, identity::batch_id(w.start(), w.end()));

        let refs: Vec<_> = result
            .pending
            .iter()
            .filter(|(_, r)| r.topic_id == topic.id)
            .collect();
        assert_eq!(refs.len(), 120);
        assert!(refs.iter().all(|(_, r)| r.topic_name == "ai policy"));
    }

    #[test]
    fn test_representatives_follow_corpus_order() {
        let corpus = articles(500);
        let result = assembled(
            TopicAssembler::new()
                .assemble(&window(), &scenario_output(), &corpus, now())
                .unwrap(),
        );

        let reps: Vec<_> = result.topics[0]
            .representative_articles
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(reps.len(), 12);
        assert_eq!(&reps[..3], &["a0", "a10", "a20"]);
        // Cluster 1 starts at document 120.
        assert_eq!(result.topics[1].representative_articles[0].id, "a120");
        assert_eq!(result.topics[2].representative_articles.len(), 5);
    }

    #[test]
    fn test_same_window_same_ids() {
        let corpus = articles(500);
        let output = scenario_output();
        let a = assembled(
            TopicAssembler::new()
                .assemble(&window(), &output, &corpus, now())
                .unwrap(),
        );
        let b = assembled(
            TopicAssembler::new()
                .assemble(&window(), &output, &corpus, now() + Duration::hours(1))
                .unwrap(),
        );
        assert_eq!(a.batch.id, b.batch.id);
        let ids_a: Vec<_> = a.topics.iter().map(|t| &t.id).collect();
        let ids_b: Vec<_> = b.topics.iter().map(|t| &t.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_single_document_is_insufficient() {
        let corpus = articles(1);
        let output = ClusteringOutput {
            assignments: vec![DocumentAssignment::member(0, true)],
            clusters: BTreeMap::from([(0, summary(&["solo"], 1))]),
        };
        let result = TopicAssembler::new()
            .assemble(&window(), &output, &corpus, now())
            .unwrap();
        assert!(matches!(result, Assembly::InsufficientSignal(_)));
    }

    #[test]
    fn test_outliers_only_is_insufficient() {
        let corpus = articles(3);
        let output = ClusteringOutput {
            assignments: vec![DocumentAssignment::outlier(); 3],
            clusters: BTreeMap::new(),
        };
        let result = TopicAssembler::new()
            .assemble(&window(), &output, &corpus, now())
            .unwrap();
        assert!(matches!(result, Assembly::InsufficientSignal(_)));
    }

    #[test]
    fn test_label_collision_aborts() {
        let corpus = articles(4);
        let output = ClusteringOutput {
            assignments: vec![
                DocumentAssignment::member(0, true),
                DocumentAssignment::member(0, false),
                DocumentAssignment::member(1, true),
                DocumentAssignment::member(1, false),
            ],
            clusters: BTreeMap::from([
                (0, summary(&["market", "news"], 2)),
                (1, summary(&["market", "news"], 2)),
            ]),
        };
        let err = TopicAssembler::new()
            .assemble(&window(), &output, &corpus, now())
            .unwrap_err();
        match err {
            InsightError::TopicIdCollision { first, second, .. } => {
                assert!(first.starts_with("cluster 0"));
                assert!(second.starts_with("cluster 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_representative_outlier_is_not_attached() {
        let corpus = articles(3);
        let output = ClusteringOutput {
            assignments: vec![
                DocumentAssignment::member(0, true),
                DocumentAssignment {
                    cluster: None,
                    is_representative: true,
                },
                DocumentAssignment::member(0, false),
            ],
            clusters: BTreeMap::from([(0, summary(&["rail", "strike"], 2))]),
        };
        let result = assembled(
            TopicAssembler::new()
                .assemble(&window(), &output, &corpus, now())
                .unwrap(),
        );

        assert_eq!(result.topics.len(), 1);
        let reps: Vec<_> = result.topics[0]
            .representative_articles
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(reps, vec!["a0"]);
        assert_eq!(result.pending.len(), 2);
        assert!(result.pending.iter().all(|(a, _)| a.id != "a1"));
    }

    #[test]
    fn test_mismatched_output_is_rejected() {
        let corpus = articles(3);
        let output = ClusteringOutput {
            assignments: vec![DocumentAssignment::outlier(); 2],
            clusters: BTreeMap::new(),
        };
        let err = TopicAssembler::new()
            .assemble(&window(), &output, &corpus, now())
            .unwrap_err();
        assert!(matches!(err, InsightError::InputMismatch { .. }));
    }
}
