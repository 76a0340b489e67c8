//! Tidings storage crate - SQLite document store, repository traits,
//! corpus loading and result persistence.
//!
//! Provides a WAL-mode SQLite database with migrations, the
//! `ArticleRepository`/`TopicRepository` capability traits with SQLite and
//! in-memory implementations, the windowed `CorpusLoader`, and the
//! `PersistenceOrchestrator` that writes a run's batch, topics and article
//! memberships.

pub mod corpus;
pub mod db;
pub mod memory;
pub mod migrations;
pub mod persistence;
pub mod repository;
pub mod sqlite;

pub use corpus::{CorpusLoader, CorpusScan};
pub use db::Database;
pub use memory::MemoryStore;
pub use persistence::{
    ArticleUpdateReport, FailedArticleUpdate, PersistenceOrchestrator, TopicStoreReport,
};
pub use repository::{
    ArticlePage, ArticleRepository, ScanCursor, TopicRepository, TopicWriteOutcome,
};
pub use sqlite::SqliteStore;
