//! Reading session: an open article, its current page, and the narration
//! service that reads it.
//!
//! Page navigation always goes through the controller's `load_page`, which
//! stops narration before the paragraph list changes. Whether to follow a
//! page boundary is left to the session's user.

use std::sync::{Arc, Mutex};

use tracing::info;

use lectio_core::types::ArticlePage;

use crate::error::{Error, Result};
use crate::pages::PageSource;
use crate::service::NarrationService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub article: String,
    pub page: u32,
    pub has_next: bool,
}

pub struct ReadingSession<S> {
    service: NarrationService,
    pages: Arc<S>,
    cursor: Arc<Mutex<Option<Cursor>>>,
}

impl<S> Clone for ReadingSession<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            pages: self.pages.clone(),
            cursor: self.cursor.clone(),
        }
    }
}

impl<S: PageSource> ReadingSession<S> {
    pub fn new(service: NarrationService, pages: S) -> Self {
        Self {
            service,
            pages: Arc::new(pages),
            cursor: Arc::new(Mutex::new(None)),
        }
    }

    pub fn service(&self) -> &NarrationService {
        &self.service
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Fetch `page` of `article` and make it the narrated page.
    pub async fn open(&self, article: &str, page: u32) -> Result<ArticlePage> {
        if page == 0 {
            return Err(Error::FirstPage);
        }
        let fetched = self.pages.fetch_page(article, page).await?;
        info!(
            "session: {article} page {page} ({} paragraphs)",
            fetched.paragraphs.len()
        );

        *self.cursor.lock().unwrap_or_else(|e| e.into_inner()) = Some(Cursor {
            article: article.to_string(),
            page,
            has_next: fetched.has_next,
        });
        self.service.load_page(fetched.clone());
        Ok(fetched)
    }

    pub async fn next_page(&self) -> Result<ArticlePage> {
        let cursor = self.cursor().ok_or(Error::NoArticle)?;
        if !cursor.has_next {
            return Err(Error::LastPage(cursor.page));
        }
        self.open(&cursor.article, cursor.page + 1).await
    }

    pub async fn previous_page(&self) -> Result<ArticlePage> {
        let cursor = self.cursor().ok_or(Error::NoArticle)?;
        if cursor.page <= 1 {
            return Err(Error::FirstPage);
        }
        self.open(&cursor.article, cursor.page - 1).await
    }
}
