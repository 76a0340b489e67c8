//! Windowed corpus loading.
//!
//! Pages through an [`ArticleRepository`] with a keyset cursor and stops at
//! the window's result cap.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};

use tidings_core::error::Result;
use tidings_core::types::{Article, QueryWindow};

use crate::repository::{ArticleRepository, ScanCursor};

/// Loads the articles of a query window from a repository.
#[derive(Clone)]
pub struct CorpusLoader {
    repo: Arc<dyn ArticleRepository>,
    page_size: usize,
}

impl CorpusLoader {
    pub fn new(repo: Arc<dyn ArticleRepository>, page_size: usize) -> Self {
        Self {
            repo,
            page_size: page_size.max(1),
        }
    }

    /// Start a one-shot scan over `window`.
    pub fn scan(&self, window: &QueryWindow) -> CorpusScan {
        CorpusScan {
            repo: Arc::clone(&self.repo),
            window: window.clone(),
            page_size: self.page_size,
            buffer: VecDeque::new(),
            cursor: None,
            yielded: 0,
            exhausted: false,
        }
    }

    /// Drain a scan into memory. Never returns more than `window.limit()`
    /// articles; matches beyond the cap are dropped without error.
    pub async fn load(&self, window: &QueryWindow) -> Result<Vec<Article>> {
        let mut scan = self.scan(window);
        let mut articles = Vec::new();
        while let Some(article) = scan.next_article().await? {
            articles.push(article);
        }

        info!(
            count = scan.yielded(),
            limit = window.limit(),
            capped = scan.hit_limit(),
            "Loaded corpus"
        );
        Ok(articles)
    }
}

impl std::fmt::Debug for CorpusLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusLoader")
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// A finite, non-restartable sequence of the articles in a window.
pub struct CorpusScan {
    repo: Arc<dyn ArticleRepository>,
    window: QueryWindow,
    page_size: usize,
    buffer: VecDeque<Article>,
    cursor: Option<ScanCursor>,
    yielded: usize,
    exhausted: bool,
}

impl CorpusScan {
    /// The next article, or `None` once the scan is exhausted or the window
    /// limit has been reached.
    pub async fn next_article(&mut self) -> Result<Option<Article>> {
        if self.hit_limit() {
            return Ok(None);
        }

        if self.buffer.is_empty() && !self.exhausted {
            // Never ask for more than the cap still allows.
            let remaining = self.window.limit() - self.yielded;
            let request = self.page_size.min(remaining);
            let page = self
                .repo
                .scan_window(&self.window, self.cursor.as_ref(), request)
                .await?;

            debug!(
                fetched = page.articles.len(),
                requested = request,
                "Fetched corpus page"
            );
            self.exhausted = page.next.is_none();
            self.cursor = page.next;
            self.buffer.extend(page.articles);
        }

        let next = self.buffer.pop_front();
        if next.is_some() {
            self.yielded += 1;
        }
        Ok(next)
    }

    /// Number of articles yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub fn hit_limit(&self) -> bool {
        self.yielded >= self.window.limit()
    }
}
