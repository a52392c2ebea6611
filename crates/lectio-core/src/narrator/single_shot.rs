//! Single-Shot Player: read one paragraph on demand.

use tracing::{debug, info, warn};

use super::Narrator;
use crate::resource::AudioBackend;
use crate::types::{AudioSource, ParagraphId, PlaybackMode};

impl<B: AudioBackend> Narrator<B> {
    /// Read one paragraph. Asking again for the paragraph that is already
    /// playing stops it; asking again while it still loads starts it over.
    pub fn play_paragraph(&mut self, id: ParagraphId) {
        if self.playback.mode() == PlaybackMode::SingleShotPlaying
            && self.playback.active_paragraph_id() == Some(id)
            && self.playback.is_audible()
        {
            info!("single-shot: paragraph {id} toggled off");
            self.stop();
            return;
        }

        // Paragraphs outside the loaded page can still be addressed by id.
        let source = match self.page.find(id) {
            Some(paragraph) => match AudioSource::for_paragraph(paragraph) {
                Some(source) => source,
                None => {
                    warn!("single-shot: paragraph {id} has nothing to narrate");
                    return;
                }
            },
            None => AudioSource::Pregenerated(id),
        };

        info!("single-shot: paragraph {id}");
        self.playback.request_start(PlaybackMode::SingleShotPlaying);
        self.playback.select(id, None);
        self.playback.install(&mut self.backend, id, source);
    }

    pub(super) fn single_shot_finished(&mut self) {
        // Only clear if the sequencer has not taken over in the meantime.
        if self.playback.mode() != PlaybackMode::SequencePlaying {
            debug!("single-shot: finished");
            self.stop();
        }
    }

    pub(super) fn single_shot_failed(&mut self, reason: String) {
        warn!("single-shot: paragraph audio failed: {reason}");
        self.stop();
    }
}
