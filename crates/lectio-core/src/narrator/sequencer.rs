//! Sequencer: whole-document narration, index by index.
//!
//! Advances only when the current unit ends or fails, never on a timer, so
//! pacing follows the real audio duration.

use tracing::{debug, info, warn};

use super::Narrator;
use crate::resource::AudioBackend;
use crate::types::{AudioSource, NarrationEvent, PlaybackMode};

impl<B: AudioBackend> Narrator<B> {
    /// Narrate the page from its first paragraph. Whatever is playing stops.
    pub fn start_whole_document(&mut self) {
        if self.page.paragraphs.is_empty() {
            debug!("sequencer: empty page, nothing to narrate");
            return;
        }
        info!("sequencer: start ({} paragraphs)", self.page.paragraphs.len());
        self.playback.request_start(PlaybackMode::SequencePlaying);
        self.advance_to(0);
    }

    /// Stop whole-document narration. A single-shot read is left alone.
    pub fn stop_whole_document(&mut self) {
        if self.playback.mode() == PlaybackMode::SequencePlaying {
            self.stop();
        }
    }

    /// Move to paragraph `index`, skipping any that cannot be narrated.
    pub(super) fn advance_to(&mut self, start: usize) {
        let mut index = start;
        loop {
            let Some(paragraph) = self.page.paragraphs.get(index) else {
                self.finish_page();
                return;
            };
            let Some(id) = paragraph.id else {
                warn!("sequencer: paragraph at index {index} has no id, skipping");
                index += 1;
                continue;
            };
            let Some(source) = AudioSource::for_paragraph(paragraph) else {
                debug!("sequencer: paragraph {id} has nothing to narrate, skipping");
                index += 1;
                continue;
            };

            debug!("sequencer: index {index} → paragraph {id}");
            self.playback.select(id, Some(index));
            self.emit(NarrationEvent::BringIntoView { paragraph_id: id });
            self.playback.install(&mut self.backend, id, source);
            return;
        }
    }

    pub(super) fn sequence_unit_finished(&mut self) {
        if let Some(index) = self.playback.active_sequence_index() {
            self.advance_to(index + 1);
        }
    }

    pub(super) fn sequence_unit_failed(&mut self, reason: String) {
        let Some(index) = self.playback.active_sequence_index() else {
            return;
        };
        if let Some(paragraph_id) = self.active_paragraph() {
            warn!("sequencer: paragraph {paragraph_id} failed ({reason}), skipping");
            self.emit(NarrationEvent::ParagraphSkipped {
                paragraph_id,
                reason,
            });
        }
        self.advance_to(index + 1);
    }

    fn finish_page(&mut self) {
        self.stop();
        if self.page.has_next {
            info!("sequencer: end of page {}, next page available", self.page.page);
            self.emit(NarrationEvent::PageBoundaryReached {
                page: self.page.page,
            });
        } else {
            info!("sequencer: end of article");
            self.emit(NarrationEvent::ArticleFinished);
        }
    }
}
