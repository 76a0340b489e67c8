//! SQLite-backed article and topic repositories.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, TransactionBehavior};
use tracing::debug;

use tidings_core::error::{Result, TidingsError};
use tidings_core::types::{
    Article, ArticleTopicRef, QueryWindow, Topic, TopicArticle, TopicBatch, TopicMembership,
};

use crate::db::Database;
use crate::repository::{ArticlePage, ArticleRepository, ScanCursor, TopicRepository};

/// Document store on top of [`Database`].
///
/// Batches and topics are written with upsert semantics: a later run over
/// the same window replaces the earlier record under the same id.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace an article's content. An existing topic membership
    /// is left untouched.
    pub fn save_article(&self, article: &Article) -> Result<()> {
        let author = serde_json::to_string(&article.author)?;
        let title = serde_json::to_string(&article.title)?;
        let paragraphs = serde_json::to_string(&article.paragraphs)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO articles (id, url, image, publish_date, author, title, paragraphs, embeddings)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    image = excluded.image,
                    publish_date = excluded.publish_date,
                    author = excluded.author,
                    title = excluded.title,
                    paragraphs = excluded.paragraphs,
                    embeddings = excluded.embeddings",
                rusqlite::params![
                    article.id,
                    article.url,
                    article.image,
                    article.publish_date.timestamp_micros(),
                    author,
                    title,
                    paragraphs,
                    encode_embeddings(&article.embeddings),
                ],
            )
            .map_err(|e| TidingsError::Storage(format!("Failed to save article: {}", e)))?;
            Ok(())
        })
    }

    /// Count stored articles.
    pub fn count_articles(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))
                .map_err(|e| TidingsError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Find a stored batch by id.
    #[cfg(test)]
    pub fn find_batch(&self, id: &str) -> Result<Option<TopicBatch>> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, query_start, query_end, query_limit, article_count, topic_count, create_time
                     FROM topic_batches WHERE id = ?1",
                    rusqlite::params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, i64>(6)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| TidingsError::Storage(e.to_string()))?;

            let Some((id, start, end, limit, article_count, topic_count, create_time)) = row else {
                return Ok(None);
            };
            Ok(Some(TopicBatch {
                id,
                query: window_from_columns(start, end, limit)?,
                create_time: from_micros(create_time)?,
                article_count: article_count as u64,
                topic_count: topic_count as u64,
            }))
        })
    }

    /// Find a stored topic by id.
    #[cfg(test)]
    pub fn find_topic(&self, id: &str) -> Result<Option<Topic>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, batch_id, batch_query_start, batch_query_end, batch_query_limit,
                            create_time, name, count, representative_articles
                     FROM topics WHERE id = ?1",
                )
                .map_err(|e| TidingsError::Storage(e.to_string()))?;
            let result = stmt
                .query_row(rusqlite::params![id], |row| Ok(row_to_topic(row)))
                .optional()
                .map_err(|e| TidingsError::Storage(e.to_string()))?;
            result.transpose()
        })
    }

    /// List the topics stored for a batch, ordered by descending count.
    pub fn topics_for_batch(&self, batch_id: &str) -> Result<Vec<Topic>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, batch_id, batch_query_start, batch_query_end, batch_query_limit,
                            create_time, name, count, representative_articles
                     FROM topics WHERE batch_id = ?1
                     ORDER BY count DESC, id ASC",
                )
                .map_err(|e| TidingsError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![batch_id], |row| Ok(row_to_topic(row)))
                .map_err(|e| TidingsError::Storage(e.to_string()))?;

            let mut topics = Vec::new();
            for row in rows {
                topics.push(row.map_err(|e| TidingsError::Storage(e.to_string()))??);
            }
            Ok(topics)
        })
    }

    /// Read an article's topic membership. `None` when the article is absent.
    #[cfg(test)]
    pub fn topic_membership(&self, article_id: &str) -> Result<Option<TopicMembership>> {
        self.db.with_conn(|conn| {
            let stored: Option<String> = conn
                .query_row(
                    "SELECT topics FROM articles WHERE id = ?1",
                    rusqlite::params![article_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| TidingsError::Storage(e.to_string()))?;
            match stored {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
    }

    /// Run `f` against the database on the blocking thread pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .map_err(|e| TidingsError::Storage(format!("Storage task failed: {}", e)))?
    }
}

#[async_trait]
impl ArticleRepository for SqliteStore {
    async fn scan_window(
        &self,
        window: &QueryWindow,
        after: Option<&ScanCursor>,
        page_size: usize,
    ) -> Result<ArticlePage> {
        let start = window.start().timestamp_micros();
        let end = window.end().timestamp_micros();
        let cursor_date = after.map(|c| c.publish_date.timestamp_micros());
        let cursor_id = after.map(|c| c.id.clone());

        let articles = self
            .blocking(move |db| {
                db.with_conn(|conn| {
                    let mut stmt = conn
                        .prepare_cached(
                            "SELECT id, url, image, publish_date, author, title, paragraphs, embeddings
                             FROM articles
                             WHERE publish_date >= ?1 AND publish_date <= ?2
                               AND (?3 IS NULL OR publish_date > ?3 OR (publish_date = ?3 AND id > ?4))
                             ORDER BY publish_date ASC, id ASC
                             LIMIT ?5",
                        )
                        .map_err(|e| TidingsError::Storage(e.to_string()))?;

                    let rows = stmt
                        .query_map(
                            rusqlite::params![start, end, cursor_date, cursor_id, page_size as i64],
                            |row| Ok(row_to_article(row)),
                        )
                        .map_err(|e| TidingsError::Storage(e.to_string()))?;

                    let mut articles = Vec::new();
                    for row in rows {
                        articles.push(row.map_err(|e| TidingsError::Storage(e.to_string()))??);
                    }
                    Ok(articles)
                })
            })
            .await?;

        debug!(count = articles.len(), "Scanned article page");
        Ok(ArticlePage::from_rows(articles, page_size))
    }

    async fn merge_article_topic(
        &self,
        article_id: &str,
        topic_ref: &ArticleTopicRef,
    ) -> Result<bool> {
        let article_id = article_id.to_string();
        let topic_ref = topic_ref.clone();

        self.blocking(move |db| {
            db.with_conn_mut(|conn| {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(|e| TidingsError::Storage(e.to_string()))?;

                let stored: Option<String> = tx
                    .query_row(
                        "SELECT topics FROM articles WHERE id = ?1",
                        rusqlite::params![article_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| TidingsError::Storage(e.to_string()))?;
                let stored = stored.ok_or_else(|| {
                    TidingsError::Storage(format!("Article not found: {}", article_id))
                })?;

                let mut membership: TopicMembership = serde_json::from_str(&stored)?;
                let changed = membership.merge(&topic_ref);
                if changed {
                    tx.execute(
                        "UPDATE articles SET topics = ?1 WHERE id = ?2",
                        rusqlite::params![serde_json::to_string(&membership)?, article_id],
                    )
                    .map_err(|e| TidingsError::Storage(format!("Failed to update article: {}", e)))?;
                }
                tx.commit()
                    .map_err(|e| TidingsError::Storage(e.to_string()))?;
                Ok(changed)
            })
        })
        .await
    }
}

#[async_trait]
impl TopicRepository for SqliteStore {
    async fn store_topic_batch(&self, batch: &TopicBatch) -> Result<String> {
        let batch = batch.clone();

        self.blocking(move |db| {
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO topic_batches (id, query_start, query_end, query_limit, article_count, topic_count, create_time)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                        query_start = excluded.query_start,
                        query_end = excluded.query_end,
                        query_limit = excluded.query_limit,
                        article_count = excluded.article_count,
                        topic_count = excluded.topic_count,
                        create_time = excluded.create_time",
                    rusqlite::params![
                        batch.id,
                        batch.query.start().timestamp_micros(),
                        batch.query.end().timestamp_micros(),
                        batch.query.limit() as i64,
                        batch.article_count as i64,
                        batch.topic_count as i64,
                        batch.create_time.timestamp_micros(),
                    ],
                )
                .map_err(|e| TidingsError::Storage(format!("Failed to store topic batch: {}", e)))?;
                Ok(batch.id)
            })
        })
        .await
    }

    async fn store_topic(&self, topic: &Topic) -> Result<String> {
        let representatives = serde_json::to_string(&topic.representative_articles)?;
        let topic = topic.clone();

        self.blocking(move |db| {
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO topics (id, batch_id, batch_query_start, batch_query_end, batch_query_limit,
                                         create_time, name, count, representative_articles)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(id) DO UPDATE SET
                        batch_id = excluded.batch_id,
                        batch_query_start = excluded.batch_query_start,
                        batch_query_end = excluded.batch_query_end,
                        batch_query_limit = excluded.batch_query_limit,
                        create_time = excluded.create_time,
                        name = excluded.name,
                        count = excluded.count,
                        representative_articles = excluded.representative_articles",
                    rusqlite::params![
                        topic.id,
                        topic.batch_id,
                        topic.batch_query.start().timestamp_micros(),
                        topic.batch_query.end().timestamp_micros(),
                        topic.batch_query.limit() as i64,
                        topic.create_time.timestamp_micros(),
                        topic.name,
                        topic.count as i64,
                        representatives,
                    ],
                )
                .map_err(|e| TidingsError::Storage(format!("Failed to store topic: {}", e)))?;
                Ok(topic.id)
            })
        })
        .await
    }
}

// ============================================================================
// Helper functions for row-to-entity conversion.
// ============================================================================

fn encode_embeddings(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embeddings(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(TidingsError::Storage(format!(
            "Embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| TidingsError::Storage(format!("Invalid timestamp: {}", micros)))
}

fn window_from_columns(start: i64, end: i64, limit: i64) -> Result<QueryWindow> {
    QueryWindow::new(from_micros(start)?, from_micros(end)?, limit.max(0) as usize)
        .map_err(|e| TidingsError::Storage(format!("Stored window is invalid: {}", e)))
}

fn row_to_article(row: &rusqlite::Row<'_>) -> Result<Article> {
    let get_err = |e: rusqlite::Error| TidingsError::Storage(e.to_string());

    let author: String = row.get(4).map_err(get_err)?;
    let title: String = row.get(5).map_err(get_err)?;
    let paragraphs: String = row.get(6).map_err(get_err)?;
    let embeddings: Vec<u8> = row.get(7).map_err(get_err)?;

    Ok(Article {
        id: row.get(0).map_err(get_err)?,
        url: row.get(1).map_err(get_err)?,
        image: row.get(2).map_err(get_err)?,
        publish_date: from_micros(row.get(3).map_err(get_err)?)?,
        author: serde_json::from_str(&author)?,
        title: serde_json::from_str(&title)?,
        paragraphs: serde_json::from_str(&paragraphs)?,
        embeddings: decode_embeddings(&embeddings)?,
    })
}

fn row_to_topic(row: &rusqlite::Row<'_>) -> Result<Topic> {
    let get_err = |e: rusqlite::Error| TidingsError::Storage(e.to_string());

    let representatives: String = row.get(8).map_err(get_err)?;
    let representative_articles: Vec<TopicArticle> = serde_json::from_str(&representatives)?;
    let count: i64 = row.get(7).map_err(get_err)?;

    Ok(Topic {
        id: row.get(0).map_err(get_err)?,
        batch_id: row.get(1).map_err(get_err)?,
        batch_query: window_from_columns(
            row.get(2).map_err(get_err)?,
            row.get(3).map_err(get_err)?,
            row.get(4).map_err(get_err)?,
        )?,
        create_time: from_micros(row.get(5).map_err(get_err)?)?,
        name: row.get(6).map_err(get_err)?,
        count: count as u64,
        representative_articles,
    })
}
