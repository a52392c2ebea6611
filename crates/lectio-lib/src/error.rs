//! Error type for the fetch and serving paths.
//!
//! Nothing on the audio path returns these to the narration controller:
//! audio failures are turned into lifecycle signals instead.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("no article open")]
    NoArticle,
    #[error("no page before page 1")]
    FirstPage,
    #[error("no page after page {0}")]
    LastPage(u32),
    #[error("narration service has shut down")]
    ServiceClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
