//! Thin client for the reading backend's REST API.

use reqwest::{RequestBuilder, Url};

use lectio_core::types::NarrationConfig;

use crate::error::{Error, Result};

/// Base URL plus optional bearer token. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &NarrationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: config.api_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone().filter(|t| !t.is_empty()),
        }
    }

    /// Absolute URL for `path` (which starts with `/`), with query pairs.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}{path}", self.base);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        let req = self.client.get(url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a GET and fail on any non-2xx status.
    pub async fn get_ok(&self, url: Url) -> Result<reqwest::Response> {
        let resp = self.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&NarrationConfig {
            api_url: base.into(),
            ..Default::default()
        })
    }

    #[test]
    fn joins_without_double_slash() {
        let url = client("http://localhost:8000/").url("/api/tts/4", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/tts/4");
    }

    #[test]
    fn encodes_query() {
        let url = client("http://localhost:8000")
            .url("/api/tts/paragraph", &[("text", "a b&c")])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/tts/paragraph?text=a+b%26c");
    }

    #[test]
    fn rejects_garbage_base() {
        assert!(matches!(
            client("not a url").url("/x", &[]),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn empty_token_is_ignored() {
        let c = ApiClient::new(&NarrationConfig {
            api_token: Some(String::new()),
            ..Default::default()
        });
        assert!(c.token.is_none());
    }
}
