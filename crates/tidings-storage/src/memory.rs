//! In-memory repositories.
//!
//! Used by tests and dry runs. Supports injecting per-id write failures so
//! partial-failure paths can be exercised without a real store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use tidings_core::error::{Result, TidingsError};
use tidings_core::types::{
    Article, ArticleTopicRef, QueryWindow, Topic, TopicBatch, TopicMembership,
};

use crate::repository::{ArticlePage, ArticleRepository, ScanCursor, TopicRepository};

#[derive(Debug, Default)]
struct Inner {
    articles: HashMap<String, (Article, TopicMembership)>,
    batches: BTreeMap<String, TopicBatch>,
    topics: BTreeMap<String, Topic>,
    failing_topics: HashSet<String>,
    failing_articles: HashSet<String>,
    fail_batches: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    scan_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: impl IntoIterator<Item = Article>) -> Self {
        let store = Self::new();
        for article in articles {
            store.insert_article(article);
        }
        store
    }

    /// Insert or replace an article, keeping any existing membership.
    pub fn insert_article(&self, article: Article) {
        let mut inner = self.lock();
        let membership = inner
            .articles
            .remove(&article.id)
            .map(|(_, m)| m)
            .unwrap_or_default();
        inner
            .articles
            .insert(article.id.clone(), (article, membership));
    }

    /// Make every later write of the topic with this id fail.
    pub fn fail_topic(&self, topic_id: &str) {
        self.lock().failing_topics.insert(topic_id.to_string());
    }

    /// Make every later membership update of this article fail.
    pub fn fail_article(&self, article_id: &str) {
        self.lock().failing_articles.insert(article_id.to_string());
    }

    /// Make every later batch write fail.
    pub fn fail_batches(&self) {
        self.lock().fail_batches = true;
    }

    /// Number of `scan_window` calls served so far.
    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn batch(&self, id: &str) -> Option<TopicBatch> {
        self.lock().batches.get(id).cloned()
    }

    pub fn batches(&self) -> Vec<TopicBatch> {
        self.lock().batches.values().cloned().collect()
    }

    pub fn topic(&self, id: &str) -> Option<Topic> {
        self.lock().topics.get(id).cloned()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.lock().topics.values().cloned().collect()
    }

    pub fn membership(&self, article_id: &str) -> Option<TopicMembership> {
        self.lock().articles.get(article_id).map(|(_, m)| m.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write; the data is
        // still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ArticleRepository for MemoryStore {
    async fn scan_window(
        &self,
        window: &QueryWindow,
        after: Option<&ScanCursor>,
        page_size: usize,
    ) -> Result<ArticlePage> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.lock();

        let mut matching: Vec<&Article> = inner
            .articles
            .values()
            .map(|(article, _)| article)
            .filter(|a| window.contains(a.publish_date))
            .filter(|a| match after {
                Some(cursor) => {
                    (a.publish_date, a.id.as_str()) > (cursor.publish_date, cursor.id.as_str())
                }
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| (a.publish_date, &a.id).cmp(&(b.publish_date, &b.id)));

        let articles = matching.into_iter().take(page_size).cloned().collect();
        Ok(ArticlePage::from_rows(articles, page_size))
    }

    async fn merge_article_topic(
        &self,
        article_id: &str,
        topic_ref: &ArticleTopicRef,
    ) -> Result<bool> {
        let mut inner = self.lock();
        if inner.failing_articles.contains(article_id) {
            return Err(TidingsError::Storage(format!(
                "Injected failure updating article {}",
                article_id
            )));
        }
        let (_, membership) = inner
            .articles
            .get_mut(article_id)
            .ok_or_else(|| TidingsError::Storage(format!("Article not found: {}", article_id)))?;
        Ok(membership.merge(topic_ref))
    }
}

#[async_trait]
impl TopicRepository for MemoryStore {
    async fn store_topic_batch(&self, batch: &TopicBatch) -> Result<String> {
        let mut inner = self.lock();
        if inner.fail_batches {
            return Err(TidingsError::Storage("Injected batch write failure".into()));
        }
        inner.batches.insert(batch.id.clone(), batch.clone());
        Ok(batch.id.clone())
    }

    async fn store_topic(&self, topic: &Topic) -> Result<String> {
        let mut inner = self.lock();
        if inner.failing_topics.contains(&topic.id) {
            return Err(TidingsError::Storage(format!(
                "Injected failure storing topic {}",
                topic.id
            )));
        }
        inner.topics.insert(topic.id.clone(), topic.clone());
        Ok(topic.id.clone())
    }
}
