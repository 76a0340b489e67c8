//! Database schema migrations.
//!
//! Applies the document-store schema: articles with their embeddings and
//! topic membership, topic batches, and topics.

use rusqlite::Connection;
use tracing::info;

use tidings_core::error::TidingsError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), TidingsError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TidingsError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| TidingsError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: document_store");
    }

    Ok(())
}

/// Version 1: document store.
///
/// Timestamps are microseconds since the Unix epoch. List fields and the
/// topic membership are JSON text; embeddings are little-endian f32 blobs.
fn apply_v1(conn: &Connection) -> Result<(), TidingsError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS articles (
            id              TEXT PRIMARY KEY NOT NULL,
            url             TEXT NOT NULL,
            image           TEXT,
            publish_date    INTEGER NOT NULL,
            author          TEXT NOT NULL DEFAULT '[]',
            title           TEXT NOT NULL DEFAULT '[]',
            paragraphs      TEXT NOT NULL DEFAULT '[]',
            embeddings      BLOB NOT NULL,
            topics          TEXT NOT NULL DEFAULT '{\"topic_ids\":[],\"topic_names\":[]}'
        );

        -- Keyset scan order for the corpus loader.
        CREATE INDEX IF NOT EXISTS idx_articles_publish_date
            ON articles (publish_date ASC, id ASC);

        CREATE TABLE IF NOT EXISTS topic_batches (
            id              TEXT PRIMARY KEY NOT NULL,
            query_start     INTEGER NOT NULL,
            query_end       INTEGER NOT NULL,
            query_limit     INTEGER NOT NULL,
            article_count   INTEGER NOT NULL,
            topic_count     INTEGER NOT NULL,
            create_time     INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS topics (
            id                      TEXT PRIMARY KEY NOT NULL,
            batch_id                TEXT NOT NULL,
            batch_query_start       INTEGER NOT NULL,
            batch_query_end         INTEGER NOT NULL,
            batch_query_limit       INTEGER NOT NULL,
            create_time             INTEGER NOT NULL,
            name                    TEXT NOT NULL,
            count                   INTEGER NOT NULL,
            representative_articles TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_topics_batch
            ON topics (batch_id);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'document_store');
        ",
    )
    .map_err(|e| TidingsError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
