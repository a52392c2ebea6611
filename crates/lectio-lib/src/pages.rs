//! Page-fetch collaborator.
//!
//! The controller never fetches pages itself; a [`crate::session::ReadingSession`]
//! asks a [`PageSource`] and hands the result to the narration service.

use std::future::Future;

use tracing::debug;

use lectio_core::types::ArticlePage;

use crate::api::ApiClient;
use crate::error::Result;

pub trait PageSource: Send + Sync + 'static {
    fn fetch_page(
        &self,
        article: &str,
        page: u32,
    ) -> impl Future<Output = Result<ArticlePage>> + Send;
}

/// `GET /api/articles/{article}/page/{page}` on the reading backend.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    api: ApiClient,
}

impl HttpPageSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl PageSource for HttpPageSource {
    async fn fetch_page(&self, article: &str, page: u32) -> Result<ArticlePage> {
        let url = self.api.url(&format!("/api/articles/{article}/page/{page}"), &[])?;
        debug!("pages: GET {url}");
        let mut fetched: ArticlePage = self.api.get_ok(url).await?.json().await?;
        // The backend omits `page` on empty pages.
        fetched.page = page;
        debug!(
            "pages: {article} page {page}: {} paragraphs, has_next={}",
            fetched.paragraphs.len(),
            fetched.has_next
        );
        Ok(fetched)
    }
}
