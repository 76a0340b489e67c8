//! Tidings application binary - composition root.
//!
//! Ties together all Tidings crates into a single executable:
//! 1. Load configuration (toml, json or yaml)
//! 2. Resolve and validate the query window
//! 3. Open the SQLite document store
//! 4. Run the topic pipeline (load -> cluster -> assemble -> persist)
//!
//! `tidings import` populates the store from a JSON-lines file.

mod cli;
mod import;
mod pipeline;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::Instrument;
use uuid::Uuid;

use tidings_core::config::{LoggingConfig, TidingsConfig};
use tidings_core::error::{Result, TidingsError};
use tidings_core::window::QueryWindowResolver;
use tidings_insight::SimilarityClusterer;
use tidings_storage::{CorpusLoader, Database, PersistenceOrchestrator, SqliteStore};

use crate::cli::{CliArgs, Command};
use crate::pipeline::{RunOutcome, TopicPipeline};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Later calls are no-ops.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if logging.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn open_store(path: &Path) -> Result<Arc<SqliteStore>> {
    let db = Database::new(path)?;
    tracing::info!(path = %path.display(), "Document store opened");
    Ok(Arc::new(SqliteStore::new(Arc::new(db))))
}

async fn run_topics(args: &CliArgs) -> Result<()> {
    let config_path = args.resolve_config_path()?;
    let config = TidingsConfig::load(&config_path)?;
    init_tracing(&args.resolve_logging(&config.logging));
    tracing::info!("Starting Tidings v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_path.display(), "Configuration loaded");

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("topic_run", run_id = %run_id);

    async {
        // Validation happens before the store is touched.
        let window = QueryWindowResolver::system().resolve(&config.query)?;
        tracing::info!(
            start = %window.start(),
            end = %window.end(),
            limit = window.limit(),
            "Query window resolved"
        );

        let store = open_store(&args.resolve_database_path(&config.storage))?;
        let pipeline = TopicPipeline::new(
            CorpusLoader::new(store.clone(), config.storage.page_size),
            Arc::new(SimilarityClusterer::from_config(&config.clustering)),
            PersistenceOrchestrator::new(store.clone(), store.clone()),
        );

        match pipeline.run(&window).await? {
            RunOutcome::Skipped { reason } => {
                tracing::info!(%reason, "Run finished without topics");
            }
            RunOutcome::Completed(report) => {
                tracing::info!(
                    batch_id = %report.batch_id,
                    topic_count = report.topic_count,
                    article_count = report.article_count,
                    stored_topics = report.stored_topic_ids.len(),
                    failed_topics = report.failed_topics.len(),
                    article_updates = report.article_updates_applied,
                    unchanged_articles = report.article_updates_unchanged,
                    failed_article_updates = report.failed_article_updates.len(),
                    "Run finished"
                );
                for topic in store.topics_for_batch(&report.batch_id)? {
                    tracing::info!(
                        topic_id = %topic.id,
                        name = %topic.name,
                        count = topic.count,
                        representatives = topic.representative_articles.len(),
                        "Topic published"
                    );
                }
                for (topic_id, reason) in &report.failed_topics {
                    tracing::warn!(%topic_id, %reason, "Topic not stored");
                }
                for failed in &report.failed_article_updates {
                    tracing::warn!(
                        article_id = %failed.article_id,
                        topic_id = %failed.topic_id,
                        reason = %failed.reason,
                        "Article membership not updated"
                    );
                }
            }
        }
        Ok::<(), TidingsError>(())
    }
    .instrument(span)
    .await
}

fn run_import(args: &CliArgs, file: &Path) -> Result<()> {
    let config_path = args.optional_config_path();
    let config = match &config_path {
        Some(path) => Some(TidingsConfig::load(path)?),
        None => None,
    };
    let storage = config
        .as_ref()
        .map(|c| c.storage.clone())
        .unwrap_or_default();
    let logging = config.map(|c| c.logging).unwrap_or_default();
    init_tracing(&args.resolve_logging(&logging));
    if let Some(path) = &config_path {
        tracing::info!(path = %path.display(), "Configuration loaded");
    }

    let store = open_store(&args.resolve_database_path(&storage))?;
    import::import_articles(&store, file)?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let result = match &args.command {
        Command::Run { .. } => run_topics(&args).await,
        Command::Import { file, .. } => run_import(&args, file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Configuration may have failed before logging was set up.
            init_tracing(&args.resolve_logging(&LoggingConfig::default()));
            tracing::error!(error = %e, "Tidings failed");
            ExitCode::FAILURE
        }
    }
}
