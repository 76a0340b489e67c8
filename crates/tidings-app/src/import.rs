//! JSON-lines article import.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use tidings_core::error::Result;
use tidings_core::types::Article;
use tidings_storage::SqliteStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Lines that did not parse as an article.
    pub malformed: usize,
}

/// Upsert every article in `path` (one JSON object per line) into `store`.
///
/// Blank lines are ignored. Malformed lines are logged and counted; storage
/// failures abort the import.
pub fn import_articles(store: &SqliteStore, path: &Path) -> Result<ImportReport> {
    let reader = BufReader::new(File::open(path)?);
    let mut report = ImportReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Article>(&line) {
            Ok(article) => {
                store.save_article(&article)?;
                report.imported += 1;
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed article");
                report.malformed += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        imported = report.imported,
        malformed = report.malformed,
        "Import finished"
    );
    Ok(report)
}
