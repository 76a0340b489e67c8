//! Writes a run's results: the batch, its topics, and per-article topic
//! membership.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use tidings_core::error::Result;
use tidings_core::types::{Article, ArticleTopicRef, Topic, TopicBatch};

use crate::repository::{ArticleRepository, TopicRepository, TopicWriteOutcome};

/// Result of a bulk topic store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicStoreReport {
    pub stored_ids: Vec<String>,
    /// `(topic id, reason)` for every topic that was not stored.
    pub failures: Vec<(String, String)>,
}

impl TopicStoreReport {
    pub fn from_outcomes(outcomes: Vec<TopicWriteOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                TopicWriteOutcome::Stored { id } => report.stored_ids.push(id),
                TopicWriteOutcome::Failed { id, reason } => report.failures.push((id, reason)),
            }
        }
        report
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// An article membership update that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedArticleUpdate {
    pub article_id: String,
    pub topic_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleUpdateReport {
    /// Updates that changed the stored membership.
    pub applied: usize,
    /// Updates that found the reference already present.
    pub unchanged: usize,
    pub failed: Vec<FailedArticleUpdate>,
}

impl ArticleUpdateReport {
    pub fn attempted(&self) -> usize {
        self.applied + self.unchanged + self.failed.len()
    }
}

/// Sequences the writes of a completed assembly.
///
/// The batch write is the only fatal one. Topic and article failures are
/// logged with the failing id, skipped, and returned to the caller.
#[derive(Clone)]
pub struct PersistenceOrchestrator {
    articles: Arc<dyn ArticleRepository>,
    topics: Arc<dyn TopicRepository>,
}

impl PersistenceOrchestrator {
    pub fn new(articles: Arc<dyn ArticleRepository>, topics: Arc<dyn TopicRepository>) -> Self {
        Self { articles, topics }
    }

    pub async fn store_batch(&self, batch: &TopicBatch) -> Result<String> {
        let id = self.topics.store_topic_batch(batch).await?;
        info!(
            batch_id = %id,
            topic_count = batch.topic_count,
            article_count = batch.article_count,
            "Stored topic batch"
        );
        Ok(id)
    }

    pub async fn store_topics(&self, topics: &[Topic]) -> TopicStoreReport {
        let report = TopicStoreReport::from_outcomes(self.topics.store_topics(topics).await);
        if report.is_partial() {
            warn!(
                stored = report.stored_ids.len(),
                failed = report.failures.len(),
                "Some topics were not stored"
            );
        } else {
            info!(stored = report.stored_ids.len(), "Stored topics");
        }
        report
    }

    /// Set-union a topic reference into one article's membership. Safe to
    /// repeat with the same pair.
    pub async fn update_article_topic(
        &self,
        article: &Article,
        topic_ref: &ArticleTopicRef,
    ) -> Result<bool> {
        self.articles.merge_article_topic(&article.id, topic_ref).await
    }

    /// Apply every pending update in order. A failing article is logged and
    /// skipped.
    pub async fn update_article_topics(
        &self,
        pending: &[(&Article, ArticleTopicRef)],
    ) -> ArticleUpdateReport {
        let mut report = ArticleUpdateReport::default();
        for (article, topic_ref) in pending {
            match self.update_article_topic(article, topic_ref).await {
                Ok(true) => report.applied += 1,
                Ok(false) => {
                    debug!(article_id = %article.id, topic_id = %topic_ref.topic_id, "Membership already present");
                    report.unchanged += 1;
                }
                Err(e) => {
                    error!(
                        article_id = %article.id,
                        topic_id = %topic_ref.topic_id,
                        error = %e,
                        "Failed to update article topics"
                    );
                    report.failed.push(FailedArticleUpdate {
                        article_id: article.id.clone(),
                        topic_id: topic_ref.topic_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            applied = report.applied,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "Updated article topics"
        );
        report
    }
}

impl std::fmt::Debug for PersistenceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceOrchestrator").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use tidings_core::error::TidingsError;
    use tidings_core::types::QueryWindow;

    fn ts(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            url: format!("https://news.example/{id}"),
            image: None,
            publish_date: ts(5),
            author: vec![],
            title: vec![],
            paragraphs: vec![],
            embeddings: vec![1.0],
        }
    }

    fn window() -> QueryWindow {
        QueryWindow::new(ts(1), ts(31), 100).unwrap()
    }

    fn topic(id: &str, name: &str) -> Topic {
        let w = window();
        Topic {
            id: id.to_string(),
            batch_id: "batch".to_string(),
            batch_query: w,
            create_time: ts(31),
            name: name.to_string(),
            count: 1,
            representative_articles: vec![],
        }
    }

    fn orchestrator(store: &Arc<MemoryStore>) -> PersistenceOrchestrator {
        PersistenceOrchestrator::new(store.clone(), store.clone())
    }

    fn topic_ref(id: &str, name: &str) -> ArticleTopicRef {
        ArticleTopicRef {
            topic_id: id.to_string(),
            topic_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_batch_failure_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.fail_batches();
        let batch = TopicBatch::new(window(), ts(31), 3, 1);
        let err = orchestrator(&store).store_batch(&batch).await.unwrap_err();
        assert!(matches!(err, TidingsError::Storage(_)));
    }

    #[tokio::test]
    async fn test_store_topics_reports_partial_failure() {
        let store = Arc::new(MemoryStore::new());
        store.fail_topic("t2");
        let topics = vec![topic("t1", "one"), topic("t2", "two"), topic("t3", "three")];

        let report = orchestrator(&store).store_topics(&topics).await;
        assert_eq!(report.stored_ids, vec!["t1", "t3"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "t2");
        assert!(report.is_partial());
        assert!(store.topic("t2").is_none());
        assert!(store.topic("t3").is_some());
    }

    #[tokio::test]
    async fn test_update_article_topic_twice_equals_once() {
        let store = Arc::new(MemoryStore::with_articles(vec![article("a1")]));
        let orch = orchestrator(&store);
        let r = topic_ref("t1", "ai policy");

        assert!(orch.update_article_topic(&article("a1"), &r).await.unwrap());
        let once = store.membership("a1").unwrap();
        assert!(!orch.update_article_topic(&article("a1"), &r).await.unwrap());
        let twice = store.membership("a1").unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.topic_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_update_article_topics_skips_failures() {
        let store = Arc::new(MemoryStore::with_articles(vec![
            article("a1"),
            article("a2"),
            article("a3"),
        ]));
        store.fail_article("a2");
        let (a1, a2, a3, ghost) = (article("a1"), article("a2"), article("a3"), article("ghost"));
        let r = topic_ref("t1", "energy");
        let pending = vec![
            (&a1, r.clone()),
            (&a2, r.clone()),
            (&a3, r.clone()),
            (&ghost, r.clone()),
            (&a1, r.clone()),
        ];

        let report = orchestrator(&store).update_article_topics(&pending).await;
        assert_eq!(report.applied, 2);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.attempted(), 5);
        let failed: Vec<_> = report.failed.iter().map(|f| f.article_id.as_str()).collect();
        assert_eq!(failed, vec!["a2", "ghost"]);
        assert!(report.failed.iter().all(|f| f.topic_id == "t1"));

        assert!(store.membership("a3").unwrap().contains_topic("t1"));
        assert!(store.membership("a2").unwrap().topic_ids.is_empty());
    }
}
