//! The topic run driver.
//!
//! Sequences one run: load the window's corpus, cluster it, assemble
//! topics, then persist the batch, the topics and the article memberships.
//! Nothing is written unless the assembly produced topics.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use tidings_core::error::{Result, TidingsError};
use tidings_core::types::QueryWindow;
use tidings_insight::{Assembly, ClusteringEngine, TopicAssembler, MIN_DOCUMENTS};
use tidings_storage::{CorpusLoader, FailedArticleUpdate, PersistenceOrchestrator};

/// Summary of a run that wrote topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub batch_id: String,
    pub topic_count: u64,
    pub article_count: u64,
    pub stored_topic_ids: Vec<String>,
    /// `(topic id, reason)` for topics that were not stored.
    pub failed_topics: Vec<(String, String)>,
    pub article_updates_applied: usize,
    pub article_updates_unchanged: usize,
    pub failed_article_updates: Vec<FailedArticleUpdate>,
}

impl RunReport {
    /// Whether any topic or article write was skipped.
    pub fn is_partial(&self) -> bool {
        !self.failed_topics.is_empty() || !self.failed_article_updates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run ended without writes.
    Skipped { reason: String },
    Completed(RunReport),
}

/// Owns the collaborators of a run.
pub struct TopicPipeline {
    loader: CorpusLoader,
    engine: Arc<dyn ClusteringEngine>,
    assembler: TopicAssembler,
    persistence: PersistenceOrchestrator,
}

impl TopicPipeline {
    pub fn new(
        loader: CorpusLoader,
        engine: Arc<dyn ClusteringEngine>,
        persistence: PersistenceOrchestrator,
    ) -> Self {
        Self {
            loader,
            engine,
            assembler: TopicAssembler::new(),
            persistence,
        }
    }

    pub async fn run(&self, window: &QueryWindow) -> Result<RunOutcome> {
        let articles = self.loader.load(window).await?;
        if articles.len() < MIN_DOCUMENTS {
            let reason = format!(
                "corpus has {} document(s), need at least {}",
                articles.len(),
                MIN_DOCUMENTS
            );
            info!(%reason, "Skipping run");
            return Ok(RunOutcome::Skipped { reason });
        }

        let texts: Vec<String> = articles.iter().map(|a| a.document_text()).collect();
        let vectors: Vec<Vec<f32>> = articles.iter().map(|a| a.embeddings.clone()).collect();
        let engine = Arc::clone(&self.engine);
        info!(documents = texts.len(), "Clustering corpus");
        let output = tokio::task::spawn_blocking(move || engine.fit(&texts, &vectors))
            .await
            .map_err(|e| TidingsError::Clustering(format!("clustering task failed: {}", e)))??;

        let assembled = match self
            .assembler
            .assemble(window, &output, &articles, Utc::now())?
        {
            Assembly::Assembled(assembled) => assembled,
            Assembly::InsufficientSignal(reason) => {
                info!(%reason, "Skipping run");
                return Ok(RunOutcome::Skipped { reason });
            }
        };

        let batch_id = self.persistence.store_batch(&assembled.batch).await?;
        let topics = self.persistence.store_topics(&assembled.topics).await;
        let updates = self
            .persistence
            .update_article_topics(&assembled.pending)
            .await;

        let report = RunReport {
            batch_id,
            topic_count: assembled.batch.topic_count,
            article_count: assembled.batch.article_count,
            stored_topic_ids: topics.stored_ids,
            failed_topics: topics.failures,
            article_updates_applied: updates.applied,
            article_updates_unchanged: updates.unchanged,
            failed_article_updates: updates.failed,
        };

        if report.is_partial() {
            warn!(
                failed_topics = report.failed_topics.len(),
                failed_article_updates = report.failed_article_updates.len(),
                "Run completed with partial failures"
            );
        }
        Ok(RunOutcome::Completed(report))
    }
}
