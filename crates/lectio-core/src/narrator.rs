//! Narration Controller: turns an article page into ordered, interruptible
//! speech.
//!
//! ```text
//! start_whole_document() ─▶ Sequencer ──┐
//!                                       ├─▶ PlaybackState ─▶ AudioBackend
//! play_paragraph(id)   ─▶ Single-Shot ──┘         ▲
//!                                                 │
//!            handle_event(ResourceEvent) ─────────┘ (ready / ended / error / timeout)
//! ```
//!
//! Every transition is a plain `&mut self` method; nothing blocks and nothing
//! captures indices in closures. The current sequence index lives only in
//! [`PlaybackState`], and a lifecycle signal is acted on only if its ticket
//! matches the installed handle.

mod sequencer;
mod single_shot;


use tracing::{debug, info, warn};

use crate::playback::PlaybackState;
use crate::resource::{AudioBackend, ResourceEvent, Signal};
use crate::types::{ArticlePage, NarrationEvent, NarrationStatus, ParagraphId, PlaybackMode};

pub struct Narrator<B: AudioBackend> {
    backend: B,
    playback: PlaybackState<B::Handle>,
    page: ArticlePage,
    outbox: Vec<NarrationEvent>,
}

impl<B: AudioBackend> Narrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            playback: PlaybackState::default(),
            page: ArticlePage::default(),
            outbox: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn page(&self) -> &ArticlePage {
        &self.page
    }

    pub fn playback(&self) -> &PlaybackState<B::Handle> {
        &self.playback
    }

    /// Replace the current page. Narration stops first; the paragraph list is
    /// only ever swapped while idle.
    pub fn load_page(&mut self, page: ArticlePage) {
        self.stop();
        debug!(
            "narrator: page {} loaded ({} paragraphs, has_next={})",
            page.page,
            page.paragraphs.len(),
            page.has_next
        );
        self.page = page;
    }

    /// Universal cancellation. Idempotent and safe to call from any signal
    /// handler: the handle is detached before any other state changes.
    pub fn stop(&mut self) {
        if self.playback.stop() {
            info!("narrator: stopped");
        }
    }

    pub fn status(&self) -> NarrationStatus {
        let mode = self.playback.mode();
        NarrationStatus {
            mode,
            is_global_playing: mode == PlaybackMode::SequencePlaying,
            active_paragraph_id: self.playback.active_paragraph_id(),
            active_sequence_index: self.playback.active_sequence_index(),
            is_loading: self.playback.is_loading(),
            page: self.page.page,
        }
    }

    /// Drain notifications produced since the last call.
    pub fn take_events(&mut self) -> Vec<NarrationEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// React to a lifecycle signal. Signals from released handles are no-ops.
    pub fn handle_event(&mut self, event: ResourceEvent) {
        if !self.playback.is_current(event.ticket) {
            debug!("narrator: stale {:?} from {}, ignored", event.signal, event.ticket);
            return;
        }

        match event.signal {
            Signal::Ready => self.on_ready(),
            Signal::Ended => self.on_ended(),
            Signal::Error(reason) => self.on_error(reason),
            Signal::LoadTimeout => {
                if self.playback.is_loading() {
                    warn!("narrator: {} still loading after safety timeout", event.ticket);
                    self.playback.clear_loading();
                }
            }
        }
    }

    fn on_ready(&mut self) {
        if let Err(e) = self.playback.play_current() {
            warn!("narrator: playback start failed: {e}");
            self.on_error(e.to_string());
        }
    }

    fn on_ended(&mut self) {
        match self.playback.mode() {
            PlaybackMode::SequencePlaying => self.sequence_unit_finished(),
            PlaybackMode::SingleShotPlaying => self.single_shot_finished(),
            PlaybackMode::Idle => {}
        }
    }

    fn on_error(&mut self, reason: String) {
        match self.playback.mode() {
            PlaybackMode::SequencePlaying => self.sequence_unit_failed(reason),
            PlaybackMode::SingleShotPlaying => self.single_shot_failed(reason),
            PlaybackMode::Idle => {}
        }
    }

    fn emit(&mut self, event: NarrationEvent) {
        self.outbox.push(event);
    }

    fn active_paragraph(&self) -> Option<ParagraphId> {
        self.playback.active_paragraph_id()
    }
}
