//! Storage capability traits.
//!
//! `ArticleRepository` and `TopicRepository` are the seams between the
//! pipeline and a backing store. Each store provides its own implementation
//! (SQLite, in-memory); none of them share state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;

use tidings_core::error::Result;
use tidings_core::types::{Article, ArticleTopicRef, QueryWindow, Topic, TopicBatch};

/// Position just after the last article returned by a scan page.
///
/// Scans are ordered by `(publish_date, id)`, so the pair is a stable keyset
/// cursor even when many articles share a publish date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor {
    pub publish_date: DateTime<Utc>,
    pub id: String,
}

impl ScanCursor {
    pub fn after(article: &Article) -> Self {
        Self {
            publish_date: article.publish_date,
            id: article.id.clone(),
        }
    }
}

/// One page of a windowed article scan.
#[derive(Debug, Clone, Default)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    /// Cursor for the following page; `None` once the scan is exhausted.
    pub next: Option<ScanCursor>,
}

impl ArticlePage {
    /// Build a page, deriving `next` from whether the page came back full.
    pub fn from_rows(articles: Vec<Article>, page_size: usize) -> Self {
        let next = if articles.len() >= page_size {
            articles.last().map(ScanCursor::after)
        } else {
            None
        };
        Self { articles, next }
    }
}

/// Outcome of storing a single topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicWriteOutcome {
    Stored { id: String },
    Failed { id: String, reason: String },
}

impl TopicWriteOutcome {
    pub fn id(&self) -> &str {
        match self {
            TopicWriteOutcome::Stored { id } | TopicWriteOutcome::Failed { id, .. } => id,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, TopicWriteOutcome::Stored { .. })
    }
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Fetch up to `page_size` articles published inside `window` (bounds
    /// inclusive) and strictly after `after`, in `(publish_date, id)` order.
    ///
    /// Implementations load identity, text and embeddings only.
    async fn scan_window(
        &self,
        window: &QueryWindow,
        after: Option<&ScanCursor>,
        page_size: usize,
    ) -> Result<ArticlePage>;

    /// Set-union `topic_ref` into the stored membership of `article_id`.
    ///
    /// Must be atomic per article and idempotent. Returns whether the stored
    /// membership changed.
    async fn merge_article_topic(&self, article_id: &str, topic_ref: &ArticleTopicRef)
        -> Result<bool>;
}

#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Upsert a batch and return its id.
    async fn store_topic_batch(&self, batch: &TopicBatch) -> Result<String>;

    /// Upsert a single topic and return its id.
    async fn store_topic(&self, topic: &Topic) -> Result<String>;

    /// Store many topics. A failing topic is recorded and skipped; the
    /// returned outcomes line up with `topics`.
    async fn store_topics(&self, topics: &[Topic]) -> Vec<TopicWriteOutcome> {
        let mut outcomes = Vec::with_capacity(topics.len());
        for topic in topics {
            match self.store_topic(topic).await {
                Ok(id) => outcomes.push(TopicWriteOutcome::Stored { id }),
                Err(e) => {
                    error!(topic_id = %topic.id, error = %e, "Failed to store topic");
                    outcomes.push(TopicWriteOutcome::Failed {
                        id: topic.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        outcomes
    }
}
