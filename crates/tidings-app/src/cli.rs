//! CLI argument definitions for the Tidings application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tidings_core::config::{LoggingConfig, StorageConfig};
use tidings_core::error::{Result, TidingsError};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "TIDINGS_QUERY_CONFIG";

/// Discovers topics in a window of embedded news articles.
#[derive(Parser, Debug)]
#[command(name = "tidings", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Path of the SQLite document store.
    #[arg(short = 'd', long = "database", global = true)]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run topic discovery over the configured window.
    Run {
        /// Configuration file (toml, json or yaml).
        config: Option<PathBuf>,
    },
    /// Load articles from a JSON-lines file into the document store.
    Import {
        /// One JSON article per line.
        file: PathBuf,

        /// Configuration file to read storage settings from.
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
}

impl CliArgs {
    /// The configuration path given to the active subcommand, if any.
    fn explicit_config(&self) -> Option<&PathBuf> {
        match &self.command {
            Command::Run { config } | Command::Import { config, .. } => config.as_ref(),
        }
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: command argument > TIDINGS_QUERY_CONFIG env var. Having
    /// neither is a configuration error.
    pub fn resolve_config_path(&self) -> Result<PathBuf> {
        resolve_config_path(self.explicit_config(), std::env::var(CONFIG_ENV).ok())
    }

    /// Like [`CliArgs::resolve_config_path`], but `None` when no path was
    /// given anywhere.
    pub fn optional_config_path(&self) -> Option<PathBuf> {
        self.resolve_config_path().ok()
    }

    /// Resolve the database path.
    ///
    /// Priority: --database flag > config file value.
    pub fn resolve_database_path(&self, storage: &StorageConfig) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(&storage.database_path))
    }

    /// Resolve logging settings.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_logging(&self, config: &LoggingConfig) -> LoggingConfig {
        let mut logging = config.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        logging
    }
}

fn resolve_config_path(explicit: Option<&PathBuf>, env: Option<String>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.clone());
    }
    match env {
        Some(p) if !p.trim().is_empty() => Ok(PathBuf::from(p)),
        _ => Err(TidingsError::Config(format!(
            "no configuration file given: pass a path or set {}",
            CONFIG_ENV
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let args = CliArgs::parse_from([
            "tidings",
            "run",
            "query.toml",
            "--log-level",
            "debug",
            "--database",
            "/tmp/store.db",
        ]);
        assert!(matches!(args.command, Command::Run { config: Some(ref p) } if p == &PathBuf::from("query.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));

        let storage = StorageConfig::default();
        assert_eq!(
            args.resolve_database_path(&storage),
            PathBuf::from("/tmp/store.db")
        );
        let logging = args.resolve_logging(&LoggingConfig::default());
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, "text");
    }

    #[test]
    fn test_parse_import() {
        let args = CliArgs::parse_from(["tidings", "import", "articles.jsonl"]);
        match &args.command {
            Command::Import { file, config } => {
                assert_eq!(file, &PathBuf::from("articles.jsonl"));
                assert!(config.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(
            args.resolve_database_path(&StorageConfig::default()),
            PathBuf::from("tidings.db")
        );
    }

    #[test]
    fn test_explicit_config_wins_over_env() {
        let explicit = PathBuf::from("a.toml");
        let path = resolve_config_path(Some(&explicit), Some("b.toml".into())).unwrap();
        assert_eq!(path, explicit);
    }

    #[test]
    fn test_env_config_fallback() {
        let path = resolve_config_path(None, Some("from-env.yaml".into())).unwrap();
        assert_eq!(path, PathBuf::from("from-env.yaml"));
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let err = resolve_config_path(None, None).unwrap_err();
        assert!(err.is_config());
        assert!(resolve_config_path(None, Some("  ".into())).is_err());
    }
}
