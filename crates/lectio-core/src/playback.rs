//! Playback State: the single authority for what is currently audible.
//!
//! Owns at most one [`AudioHandle`]. Installing a new handle always releases
//! the previous one first, so two resources are never attached at once.

use tracing::debug;

use crate::resource::{AcquireRequest, AudioBackend, AudioHandle, ResourceError, Ticket};
use crate::types::{AudioSource, ParagraphId, PlaybackMode};

#[derive(Debug)]
pub struct PlaybackState<H> {
    mode: PlaybackMode,
    active_paragraph_id: Option<ParagraphId>,
    active_sequence_index: Option<usize>,
    is_loading: bool,
    /// Set once the installed handle accepted `play()`.
    is_audible: bool,
    current: Option<H>,
    last_ticket: u64,
}

impl<H> Default for PlaybackState<H> {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Idle,
            active_paragraph_id: None,
            active_sequence_index: None,
            is_loading: false,
            is_audible: false,
            current: None,
            last_ticket: 0,
        }
    }
}

impl<H: AudioHandle> PlaybackState<H> {
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn active_paragraph_id(&self) -> Option<ParagraphId> {
        self.active_paragraph_id
    }

    pub fn active_sequence_index(&self) -> Option<usize> {
        self.active_sequence_index
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_audible(&self) -> bool {
        self.is_audible
    }

    pub fn has_handle(&self) -> bool {
        self.current.is_some()
    }

    /// Ticket of the installed handle, if any.
    pub fn current_ticket(&self) -> Option<Ticket> {
        self.current.as_ref().map(|h| h.ticket())
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current_ticket() == Some(ticket)
    }

    /// Stop whatever is active and enter `mode` with no paragraph selected.
    pub fn request_start(&mut self, mode: PlaybackMode) {
        self.release();
        self.mode = mode;
        self.active_paragraph_id = None;
        self.active_sequence_index = None;
    }

    /// Point the state at a paragraph. `index` is only kept in sequence mode.
    pub fn select(&mut self, paragraph_id: ParagraphId, index: Option<usize>) {
        self.active_paragraph_id = Some(paragraph_id);
        self.active_sequence_index = match self.mode {
            PlaybackMode::SequencePlaying => index,
            _ => None,
        };
    }

    /// Release the previous handle, then acquire a new one for the selected
    /// paragraph. Loading starts immediately.
    pub fn install<B>(&mut self, backend: &mut B, paragraph_id: ParagraphId, source: AudioSource) -> Ticket
    where
        B: AudioBackend<Handle = H>,
    {
        self.release();
        self.last_ticket += 1;
        let ticket = Ticket(self.last_ticket);
        debug!("playback: acquire {ticket} for paragraph {paragraph_id}");
        let handle = backend.acquire(AcquireRequest {
            ticket,
            paragraph_id,
            source,
        });
        self.current = Some(handle);
        self.is_loading = true;
        ticket
    }

    /// Start the installed handle. On refusal the error is returned and the
    /// caller decides how to recover.
    pub fn play_current(&mut self) -> Result<(), ResourceError> {
        self.is_loading = false;
        match self.current.as_mut() {
            Some(handle) => {
                handle.play()?;
                self.is_audible = true;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Clear the spinner without touching playback.
    pub fn clear_loading(&mut self) {
        self.is_loading = false;
    }

    /// Detach and free the installed handle. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.current.take() {
            debug!("playback: release {}", handle.ticket());
            handle.release();
        }
        self.is_loading = false;
        self.is_audible = false;
    }

    /// Return to Idle. Returns `false` when already idle.
    pub fn stop(&mut self) -> bool {
        if self.mode == PlaybackMode::Idle && self.current.is_none() {
            return false;
        }
        self.release();
        self.mode = PlaybackMode::Idle;
        self.active_paragraph_id = None;
        self.active_sequence_index = None;
        true
    }
}
