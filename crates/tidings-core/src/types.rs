use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WindowError;
use crate::identity;

/// Result-count cap applied when the configuration omits `limit`.
pub const DEFAULT_QUERY_LIMIT: usize = 8000;

// =============================================================================
// Query window
// =============================================================================

/// The inclusive publish-date range and result cap a run operates over.
///
/// Created once per run from configuration and immutable thereafter; the
/// constructor enforces `start <= end` and a positive limit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
}

impl QueryWindow {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::InvertedWindow { start, end });
        }
        if limit == 0 {
            return Err(WindowError::NonPositiveLimit(0));
        }
        Ok(Self { start, end, limit })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether `ts` falls inside the window, bounds included.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

// =============================================================================
// Articles
// =============================================================================

/// A pre-embedded article as read from the document store.
///
/// Only the fields the topic pipeline needs are carried; the store may hold
/// more.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub image: Option<String>,
    pub publish_date: DateTime<Utc>,
    #[serde(default)]
    pub author: Vec<String>,
    /// Titles may be stored as several fragments.
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    pub embeddings: Vec<f32>,
}

impl Article {
    /// The text handed to the clustering engine: title fragments, then
    /// paragraphs, newline separated.
    pub fn document_text(&self) -> String {
        format!("{}\n{}", self.title.join("\n"), self.paragraphs.join("\n"))
    }
}

/// Projection of an [`Article`] stored inside a topic as a representative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicArticle {
    pub id: String,
    pub url: String,
    pub image: Option<String>,
    pub publish_date: DateTime<Utc>,
    pub author: Vec<String>,
    pub title: Vec<String>,
}

impl From<&Article> for TopicArticle {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id.clone(),
            url: article.url.clone(),
            image: article.image.clone(),
            publish_date: article.publish_date,
            author: article.author.clone(),
            title: article.title.clone(),
        }
    }
}

// =============================================================================
// Topics
// =============================================================================

/// The record of one full pipeline run over a window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TopicBatch {
    pub id: String,
    pub query: QueryWindow,
    pub create_time: DateTime<Utc>,
    /// Sum of member counts over all non-outlier clusters.
    pub article_count: u64,
    /// Number of non-outlier clusters.
    pub topic_count: u64,
}

impl TopicBatch {
    /// Build a batch whose id is derived from the window bounds.
    pub fn new(
        query: QueryWindow,
        create_time: DateTime<Utc>,
        article_count: u64,
        topic_count: u64,
    ) -> Self {
        Self {
            id: identity::batch_id(query.start(), query.end()),
            query,
            create_time,
            article_count,
            topic_count,
        }
    }
}

/// A discovered topic: one per non-outlier cluster per run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Topic {
    pub id: String,
    pub batch_id: String,
    pub batch_query: QueryWindow,
    pub create_time: DateTime<Utc>,
    /// Space-joined label tokens.
    pub name: String,
    pub count: u64,
    pub representative_articles: Vec<TopicArticle>,
}

impl Topic {
    /// The membership reference written onto every article of this topic.
    pub fn article_ref(&self) -> ArticleTopicRef {
        ArticleTopicRef {
            topic_id: self.id.clone(),
            topic_name: self.name.clone(),
        }
    }
}

/// The unit of idempotent mutation applied to an article's membership.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleTopicRef {
    pub topic_id: String,
    pub topic_name: String,
}

/// Topic membership stored on an article.
///
/// Both lists behave as sets: [`TopicMembership::merge`] appends an entry
/// only when it is absent, so applying the same reference any number of
/// times converges to the same state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMembership {
    #[serde(default)]
    pub topic_ids: Vec<String>,
    #[serde(default)]
    pub topic_names: Vec<String>,
}

impl TopicMembership {
    /// Set-union `topic_ref` into the membership. Returns whether anything
    /// changed.
    pub fn merge(&mut self, topic_ref: &ArticleTopicRef) -> bool {
        let mut changed = false;
        if !self.topic_ids.contains(&topic_ref.topic_id) {
            self.topic_ids.push(topic_ref.topic_id.clone());
            changed = true;
        }
        if !self.topic_names.contains(&topic_ref.topic_name) {
            self.topic_names.push(topic_ref.topic_name.clone());
            changed = true;
        }
        changed
    }

    pub fn contains_topic(&self, topic_id: &str) -> bool {
        self.topic_ids.iter().any(|id| id == topic_id)
    }
}
