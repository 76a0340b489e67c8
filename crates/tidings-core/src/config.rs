use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TidingsError};

/// Top-level configuration for a topic-discovery run.
///
/// The file format is picked from the extension: `.toml`, `.json`, `.yaml`
/// or `.yml`. Only the `query` section is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TidingsConfig {
    pub query: QueryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TidingsConfig {
    /// Load configuration from a file.
    ///
    /// Returns an error if the file cannot be read, has an unsupported
    /// extension, or cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let config = match extension.as_deref() {
            Some("toml") => Self::from_toml(&content)?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| TidingsError::Config(e.to_string()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            other => {
                return Err(TidingsError::Config(format!(
                    "unsupported config format {:?} for {}",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// The `query` section: raw, unresolved window bounds and the result cap.
///
/// Bounds stay strings here; [`crate::window::QueryWindowResolver`] turns
/// them into a validated window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub publish_date: PublishDateQuery,
    /// Defaults to [`crate::types::DEFAULT_QUERY_LIMIT`] when omitted.
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDateQuery {
    pub start: String,
    pub end: String,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite document store.
    pub database_path: String,
    /// Number of articles fetched per scan page.
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "tidings.db".to_string(),
            page_size: 500,
        }
    }
}

/// Parameters of the built-in clustering engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Cosine similarity at or above which two documents are linked.
    pub similarity_threshold: f32,
    /// Components smaller than this are treated as outliers.
    pub min_cluster_size: usize,
    /// Representative documents flagged per cluster.
    pub representative_docs: usize,
    /// Label tokens kept per cluster.
    pub label_words: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.55,
            min_cluster_size: 10,
            representative_docs: 3,
            label_words: 10,
        }
    }
}

/// Log output settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error.
    pub level: String,
    /// "text" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
