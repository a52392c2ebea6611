//! rodio-backed Audio Resource Handles.
//!
//! Pipeline for one handle:
//!
//! ```text
//! acquire(ticket, source) → fetch task: provider.fetch(source)
//!     → [play_tx] Prepare → playback thread: decode into a paused sink → Ready
//! handle.play()           → [play_tx] Play → sink.play()
//!                           playback thread polls sinks → Ended when drained
//! handle.release()        → detach signals, abort tasks, [play_tx] Release → sink.stop()
//! ```
//!
//! A timer task armed at acquire time raises `LoadTimeout` if nothing else
//! happened first; the controller decides what that means.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use lectio_core::resource::{
    AcquireRequest, AudioBackend, AudioHandle, ResourceError, Signal, Ticket,
};

use crate::error::Result;
use crate::provider::AudioProvider;
use crate::signals::{HandleSignals, SignalSender};

/// How often the playback thread checks whether a started sink has drained.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

enum PlayCmd {
    Prepare { audio: Vec<u8>, signals: HandleSignals },
    Play(Ticket),
    Release(Ticket),
}

/// Audio backend: HTTP fetch on tokio, decode and output on a dedicated thread.
pub struct RodioBackend<P> {
    provider: Arc<P>,
    signals: SignalSender,
    play_tx: Sender<PlayCmd>,
    load_timeout: Duration,
}

impl<P: AudioProvider> RodioBackend<P> {
    /// Spawn the playback thread. `acquire` must later be called from
    /// inside a tokio runtime.
    pub fn new(provider: P, signals: SignalSender, load_timeout: Duration) -> Result<Self> {
        // rodio OutputStream is !Send, so it lives on its own OS thread
        let (play_tx, play_rx) = std::sync::mpsc::channel::<PlayCmd>();
        std::thread::Builder::new()
            .name("lectio-playback".into())
            .spawn(move || playback_thread(play_rx))?;

        Ok(Self {
            provider: Arc::new(provider),
            signals,
            play_tx,
            load_timeout,
        })
    }
}

impl<P: AudioProvider> AudioBackend for RodioBackend<P> {
    type Handle = RodioHandle;

    fn acquire(&mut self, request: AcquireRequest) -> RodioHandle {
        let signals = self.signals.scoped(request.ticket);

        let fetch = {
            let provider = self.provider.clone();
            let signals = signals.clone();
            let play_tx = self.play_tx.clone();
            let source = request.source;
            tokio::spawn(async move {
                match provider.fetch(&source).await {
                    Ok(audio) => {
                        if signals.is_detached() {
                            return;
                        }
                        let prepare = PlayCmd::Prepare {
                            audio,
                            signals: signals.clone(),
                        };
                        if play_tx.send(prepare).is_err() {
                            signals.emit(Signal::Error("playback thread stopped".into()));
                        }
                    }
                    Err(e) => {
                        warn!("audio: fetch for {} failed: {e}", signals.ticket());
                        signals.emit(Signal::Error(e.to_string()));
                    }
                }
            })
        };

        let timeout = {
            let signals = signals.clone();
            let after = self.load_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                signals.emit(Signal::LoadTimeout);
            })
        };

        RodioHandle {
            signals,
            play_tx: self.play_tx.clone(),
            tasks: vec![fetch, timeout],
        }
    }
}

/// One paragraph's audio. Releasing (or dropping) it silences the sink and
/// every signal it would still raise.
pub struct RodioHandle {
    signals: HandleSignals,
    play_tx: Sender<PlayCmd>,
    tasks: Vec<JoinHandle<()>>,
}

impl AudioHandle for RodioHandle {
    fn ticket(&self) -> Ticket {
        self.signals.ticket()
    }

    fn play(&mut self) -> std::result::Result<(), ResourceError> {
        self.play_tx
            .send(PlayCmd::Play(self.ticket()))
            .map_err(|_| ResourceError::OutputUnavailable)
    }

    fn release(&mut self) {
        if self.signals.is_detached() {
            return;
        }
        self.signals.detach();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let _ = self.play_tx.send(PlayCmd::Release(self.ticket()));
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        self.release();
    }
}

// ─── Playback OS thread ───────────────────────────────────────────────────

struct Slot {
    sink: Sink,
    signals: HandleSignals,
    started: bool,
}

fn playback_thread(cmd_rx: Receiver<PlayCmd>) {
    let output = match OutputStream::try_default() {
        Ok(pair) => Some(pair),
        Err(e) => {
            error!("playback: failed to open audio output: {e}");
            None
        }
    };

    let mut slots: HashMap<Ticket, Slot> = HashMap::new();

    loop {
        match cmd_rx.recv_timeout(POLL_INTERVAL) {
            Ok(PlayCmd::Prepare { audio, signals }) => {
                if signals.is_detached() {
                    continue;
                }
                let Some((_stream, handle)) = output.as_ref() else {
                    signals.emit(Signal::Error("audio output unavailable".into()));
                    continue;
                };
                match prepare_sink(handle, audio) {
                    Ok(sink) => {
                        debug!("playback: {} prepared", signals.ticket());
                        slots.insert(
                            signals.ticket(),
                            Slot {
                                sink,
                                signals: signals.clone(),
                                started: false,
                            },
                        );
                        signals.emit(Signal::Ready);
                    }
                    Err(reason) => signals.emit(Signal::Error(reason)),
                }
            }
            Ok(PlayCmd::Play(ticket)) => {
                if let Some(slot) = slots.get_mut(&ticket) {
                    slot.sink.play();
                    slot.started = true;
                }
            }
            Ok(PlayCmd::Release(ticket)) => {
                if let Some(slot) = slots.remove(&ticket) {
                    debug!("playback: {ticket} released");
                    slot.sink.stop();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        slots.retain(|ticket, slot| {
            if slot.started && slot.sink.empty() {
                debug!("playback: {ticket} ended");
                slot.signals.emit(Signal::Ended);
                false
            } else {
                true
            }
        });
    }

    for (_, slot) in slots.drain() {
        slot.sink.stop();
    }
}

/// Decode into a paused sink so `Ready` means playback can start at once.
fn prepare_sink(handle: &OutputStreamHandle, audio: Vec<u8>) -> std::result::Result<Sink, String> {
    let source = Decoder::new(Cursor::new(audio)).map_err(|e| format!("decode failed: {e}"))?;
    let sink = Sink::try_new(handle).map_err(|e| format!("audio sink unavailable: {e}"))?;
    sink.pause();
    sink.append(source);
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::signals::SignalReceiver;
    use lectio_core::resource::ResourceEvent;
    use lectio_core::types::{AudioSource, ParagraphId};

    struct FakeProvider {
        audio: Option<Vec<u8>>,
        delay: Duration,
    }

    impl AudioProvider for FakeProvider {
        async fn fetch(&self, _source: &AudioSource) -> Result<Vec<u8>> {
            tokio::time::sleep(self.delay).await;
            self.audio.clone().ok_or(Error::InvalidUrl("fake".into()))
        }
    }

    fn backend(
        audio: Option<Vec<u8>>,
        delay: Duration,
        timeout: Duration,
    ) -> (RodioBackend<FakeProvider>, SignalReceiver) {
        let (signals, rx) = SignalSender::channel();
        let backend = RodioBackend::new(FakeProvider { audio, delay }, signals, timeout).unwrap();
        (backend, rx)
    }

    fn request(ticket: u64) -> AcquireRequest {
        AcquireRequest {
            ticket: Ticket(ticket),
            paragraph_id: ParagraphId(ticket),
            source: AudioSource::Pregenerated(ParagraphId(ticket)),
        }
    }

    async fn next(rx: &mut SignalReceiver) -> ResourceEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no signal")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn fetch_failure_signals_error() {
        let (mut backend, mut rx) = backend(None, Duration::ZERO, Duration::from_secs(30));
        let _handle = backend.acquire(request(1));
        let ev = next(&mut rx).await;
        assert_eq!(ev.ticket, Ticket(1));
        assert!(matches!(ev.signal, Signal::Error(_)));
    }

    #[tokio::test]
    async fn undecodable_audio_signals_error() {
        // Either the decoder rejects the bytes or there is no output device.
        let (mut backend, mut rx) =
            backend(Some(b"not audio".to_vec()), Duration::ZERO, Duration::from_secs(30));
        let _handle = backend.acquire(request(2));
        assert!(matches!(next(&mut rx).await.signal, Signal::Error(_)));
    }

    #[tokio::test]
    async fn stalled_fetch_signals_load_timeout() {
        let (mut backend, mut rx) =
            backend(Some(Vec::new()), Duration::from_secs(30), Duration::from_millis(20));
        let _handle = backend.acquire(request(3));
        assert_eq!(next(&mut rx).await, ResourceEvent::new(Ticket(3), Signal::LoadTimeout));
    }

    #[tokio::test]
    async fn released_handle_stays_silent() {
        let (mut backend, mut rx) =
            backend(None, Duration::from_millis(20), Duration::from_millis(40));
        let mut handle = backend.acquire(request(4));
        handle.release();
        handle.release();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_handle_stays_silent() {
        let (mut backend, mut rx) = backend(None, Duration::from_millis(20), Duration::from_millis(40));
        drop(backend.acquire(request(5)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
