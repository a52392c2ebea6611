//! Shared types for the lectio narration controller.
//!
//! Kept free of tokio and rodio so the page-fetch and HTTP layers can depend
//! on them without pulling in the audio stack.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::text_prep::{clean_paragraph_text, is_narratable};

// ─── Article content ───────────────────────────────────────────────────────

/// Stable paragraph identifier, unique within an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParagraphId(pub u64);

impl fmt::Display for ParagraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParagraphId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// One element of an article page.
///
/// A paragraph with an `image_url` is image-only and has nothing to narrate.
/// `audio_path` is set when the backend has pre-generated speech for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub id: Option<ParagraphId>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_path: Option<String>,
}

impl Paragraph {
    /// Text paragraph without pre-generated audio.
    pub fn text(id: u64, content: impl Into<String>) -> Self {
        Self {
            id: Some(ParagraphId(id)),
            content: content.into(),
            image_url: None,
            audio_path: None,
        }
    }

    pub fn is_image_only(&self) -> bool {
        self.image_url.is_some()
    }
}

/// One page of an article as returned by the page-fetch collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticlePage {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub has_next: bool,
}

fn first_page() -> u32 {
    1
}

impl ArticlePage {
    pub fn new(page: u32, paragraphs: Vec<Paragraph>, has_next: bool) -> Self {
        Self {
            page,
            paragraphs,
            has_next,
        }
    }

    pub fn find(&self, id: ParagraphId) -> Option<&Paragraph> {
        self.paragraphs.iter().find(|p| p.id == Some(id))
    }
}

// ─── Audio sources ─────────────────────────────────────────────────────────

/// Where a paragraph's speech comes from. Both producers share one lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Pre-generated audio addressed by paragraph id.
    Pregenerated(ParagraphId),
    /// Audio looked up by the paragraph's stored text.
    Synthesized(String),
}

impl AudioSource {
    /// Pick the producer for a paragraph, or `None` if it has nothing to say.
    pub fn for_paragraph(paragraph: &Paragraph) -> Option<Self> {
        if paragraph.is_image_only() {
            return None;
        }
        if let (Some(id), Some(_)) = (paragraph.id, paragraph.audio_path.as_deref()) {
            return Some(Self::Pregenerated(id));
        }
        // The text endpoint matches on the stored content, so it goes out as-is.
        is_narratable(&clean_paragraph_text(&paragraph.content))
            .then(|| Self::Synthesized(paragraph.content.clone()))
    }
}

// ─── Controller state ──────────────────────────────────────────────────────

/// What the controller is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    Idle,
    SequencePlaying,
    SingleShotPlaying,
}

/// Observable snapshot for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrationStatus {
    pub mode: PlaybackMode,
    pub is_global_playing: bool,
    pub active_paragraph_id: Option<ParagraphId>,
    pub active_sequence_index: Option<usize>,
    pub is_loading: bool,
    pub page: u32,
}

/// Notifications emitted to the UI as narration progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NarrationEvent {
    /// Scroll this paragraph into the centre of the viewport.
    BringIntoView { paragraph_id: ParagraphId },
    /// A paragraph's audio failed and the sequence moved past it.
    ParagraphSkipped {
        paragraph_id: ParagraphId,
        reason: String,
    },
    /// The sequence exhausted the page and a next page exists.
    PageBoundaryReached { page: u32 },
    /// The sequence exhausted the last page.
    ArticleFinished,
}

impl NarrationEvent {
    /// Short name, used as the SSE event field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BringIntoView { .. } => "bring_into_view",
            Self::ParagraphSkipped { .. } => "paragraph_skipped",
            Self::PageBoundaryReached { .. } => "page_boundary_reached",
            Self::ArticleFinished => "article_finished",
        }
    }
}

// ─── Configuration ─────────────────────────────────────────────────────────

/// Default safety timeout for a resource that never becomes ready.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Narration runtime configuration.
#[derive(Debug, Clone)]
pub struct NarrationConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub load_timeout: Duration,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            api_token: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}
