//! Audio producers: where a paragraph's speech bytes come from.
//!
//! The reading backend serves pre-generated MP3s by paragraph id and has a
//! text-addressed endpoint for paragraphs without a stable audio path. Both
//! are plain GETs returning `audio/mpeg`.

use std::future::Future;

use futures_util::StreamExt;
use reqwest::Url;
use tracing::debug;

use lectio_core::types::AudioSource;

use crate::api::ApiClient;
use crate::error::Result;

/// Upper bound on the buffer reserved from a response's Content-Length.
const MAX_PREALLOC: usize = 8 << 20;

/// Fetches encoded audio for a source.
pub trait AudioProvider: Send + Sync + 'static {
    fn fetch(&self, source: &AudioSource) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpAudioProvider {
    api: ApiClient,
}

impl HttpAudioProvider {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn url_for(&self, source: &AudioSource) -> Result<Url> {
        match source {
            AudioSource::Pregenerated(id) => self.api.url(&format!("/api/tts/{id}"), &[]),
            AudioSource::Synthesized(text) => {
                self.api.url("/api/tts/paragraph", &[("text", text.as_str())])
            }
        }
    }
}

impl AudioProvider for HttpAudioProvider {
    async fn fetch(&self, source: &AudioSource) -> Result<Vec<u8>> {
        let url = self.url_for(source)?;
        debug!("provider: GET {url}");
        let resp = self.api.get_ok(url).await?;

        let mut body = Vec::with_capacity(capacity_hint(resp.content_length()));
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }
        debug!("provider: received {} bytes", body.len());
        Ok(body)
    }
}

fn capacity_hint(content_length: Option<u64>) -> usize {
    content_length.map_or(0, |len| len.min(MAX_PREALLOC as u64) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectio_core::types::{NarrationConfig, ParagraphId};

    fn provider() -> HttpAudioProvider {
        HttpAudioProvider::new(ApiClient::new(&NarrationConfig::default()))
    }

    #[test]
    fn pregenerated_url() {
        let url = provider()
            .url_for(&AudioSource::Pregenerated(ParagraphId(12)))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/tts/12");
    }

    #[test]
    fn synthesized_url_carries_text() {
        let url = provider()
            .url_for(&AudioSource::Synthesized("Hello, world.".into()))
            .unwrap();
        assert_eq!(url.path(), "/api/tts/paragraph");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "text");
        assert_eq!(value, "Hello, world.");
    }

    #[test]
    fn capacity_hint_is_capped() {
        assert_eq!(capacity_hint(None), 0);
        assert_eq!(capacity_hint(Some(4096)), 4096);
        assert_eq!(capacity_hint(Some(u64::MAX)), MAX_PREALLOC);
    }
}
