//! Narration service: async driver around the narration state machine.
//!
//! ```text
//! start_whole_document() / play_paragraph(id) / stop() / load_page(page)
//!     → [cmd_tx] ─┐
//!                 ├─▶ driver task: Narrator (sole owner) → status watch + event broadcast
//! backend signals → [signal_rx] ─┘
//! ```
//!
//! Commands and lifecycle signals are handled one at a time by a single task,
//! so the controller never runs concurrently with itself.

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

use lectio_core::Narrator;
use lectio_core::resource::AudioBackend;
use lectio_core::types::{ArticlePage, NarrationEvent, NarrationStatus, ParagraphId};

use crate::signals::{SignalReceiver, SignalSender};

/// Buffered notifications per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Cloneable handle to the narration driver. All methods are non-blocking.
#[derive(Clone)]
pub struct NarrationService {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    status_rx: watch::Receiver<NarrationStatus>,
    events_tx: broadcast::Sender<NarrationEvent>,
}

enum Cmd {
    LoadPage(ArticlePage),
    StartWholeDocument,
    StopWholeDocument,
    PlayParagraph(ParagraphId),
    Stop,
}

impl NarrationService {
    /// Spawn the driver. `make_backend` receives the sender its handles use
    /// to report lifecycle signals.
    pub fn spawn<B, F>(make_backend: F) -> Self
    where
        B: AudioBackend + Send + 'static,
        B::Handle: Send,
        F: FnOnce(SignalSender) -> B,
    {
        let (signals, signal_rx) = SignalSender::channel();
        let narrator = Narrator::new(make_backend(signals));
        Self::spawn_with(narrator, signal_rx)
    }

    /// Like [`spawn`](Self::spawn) for backends whose construction can fail.
    pub fn try_spawn<B, F, E>(make_backend: F) -> Result<Self, E>
    where
        B: AudioBackend + Send + 'static,
        B::Handle: Send,
        F: FnOnce(SignalSender) -> Result<B, E>,
    {
        let (signals, signal_rx) = SignalSender::channel();
        let narrator = Narrator::new(make_backend(signals)?);
        Ok(Self::spawn_with(narrator, signal_rx))
    }

    fn spawn_with<B>(narrator: Narrator<B>, signal_rx: SignalReceiver) -> Self
    where
        B: AudioBackend + Send + 'static,
        B::Handle: Send,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(narrator.status());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let driver_events = events_tx.clone();
        tokio::spawn(async move {
            driver_task(narrator, cmd_rx, signal_rx, status_tx, driver_events).await;
        });

        Self {
            cmd_tx,
            status_rx,
            events_tx,
        }
    }

    /// Hand a freshly fetched page to the controller. Narration stops first.
    pub fn load_page(&self, page: ArticlePage) {
        let _ = self.cmd_tx.send(Cmd::LoadPage(page));
    }

    pub fn start_whole_document(&self) {
        let _ = self.cmd_tx.send(Cmd::StartWholeDocument);
    }

    pub fn stop_whole_document(&self) {
        let _ = self.cmd_tx.send(Cmd::StopWholeDocument);
    }

    pub fn play_paragraph(&self, id: ParagraphId) {
        let _ = self.cmd_tx.send(Cmd::PlayParagraph(id));
    }

    /// Stop whatever is playing.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(Cmd::Stop);
    }

    pub fn status(&self) -> NarrationStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<NarrationStatus> {
        self.status_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<NarrationEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

async fn driver_task<B: AudioBackend>(
    mut narrator: Narrator<B>,
    mut cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    mut signal_rx: SignalReceiver,
    status_tx: watch::Sender<NarrationStatus>,
    events_tx: broadcast::Sender<NarrationEvent>,
) {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => apply(&mut narrator, cmd),
                None => break,
            },
            Some(event) = signal_rx.recv() => narrator.handle_event(event),
        }

        // Status first, so a subscriber reacting to an event sees the state
        // that produced it.
        let status = narrator.status();
        status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        for event in narrator.take_events() {
            debug!("driver: event {}", event.kind());
            // No subscribers is fine.
            let _ = events_tx.send(event);
        }
    }

    info!("driver: all handles dropped, shutting down");
    narrator.stop();
}

fn apply<B: AudioBackend>(narrator: &mut Narrator<B>, cmd: Cmd) {
    match cmd {
        Cmd::LoadPage(page) => narrator.load_page(page),
        Cmd::StartWholeDocument => narrator.start_whole_document(),
        Cmd::StopWholeDocument => narrator.stop_whole_document(),
        Cmd::PlayParagraph(id) => narrator.play_paragraph(id),
        Cmd::Stop => narrator.stop(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use lectio_core::resource::{AcquireRequest, AudioHandle, ResourceError, Signal, Ticket};
    use lectio_core::types::{Paragraph, PlaybackMode};

    use super::*;
    use crate::signals::HandleSignals;

    /// Backend whose handles are driven by the test through the shared log.
    pub(crate) struct ScriptedBackend {
        log: Arc<Mutex<Vec<HandleSignals>>>,
        signals: SignalSender,
    }

    pub(crate) struct ScriptedHandle(HandleSignals);

    impl AudioBackend for ScriptedBackend {
        type Handle = ScriptedHandle;

        fn acquire(&mut self, request: AcquireRequest) -> ScriptedHandle {
            let signals = self.signals.scoped(request.ticket);
            self.log.lock().unwrap().push(signals.clone());
            ScriptedHandle(signals)
        }
    }

    impl AudioHandle for ScriptedHandle {
        fn ticket(&self) -> Ticket {
            self.0.ticket()
        }

        fn play(&mut self) -> Result<(), ResourceError> {
            Ok(())
        }

        fn release(&mut self) {
            self.0.detach();
        }
    }

    pub(crate) fn scripted_service() -> (NarrationService, Arc<Mutex<Vec<HandleSignals>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let backend_log = log.clone();
        let service = NarrationService::spawn(move |signals| ScriptedBackend {
            log: backend_log,
            signals,
        });
        (service, log)
    }

    pub(crate) fn two_paragraphs(has_next: bool) -> ArticlePage {
        ArticlePage::new(
            1,
            vec![Paragraph::text(1, "First paragraph."), Paragraph::text(2, "Second one.")],
            has_next,
        )
    }

    /// Emit from the most recently acquired handle.
    fn emit_latest(log: &Arc<Mutex<Vec<HandleSignals>>>, signal: Signal) {
        let latest = log.lock().unwrap().last().cloned().expect("nothing acquired");
        latest.emit(signal);
    }

    async fn wait_for(
        rx: &mut watch::Receiver<NarrationStatus>,
        f: impl FnMut(&NarrationStatus) -> bool,
    ) -> NarrationStatus {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
            .await
            .expect("status never matched")
            .expect("driver stopped")
            .clone()
    }

    async fn next_event(rx: &mut broadcast::Receiver<NarrationEvent>) -> NarrationEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn narrates_page_to_completion() {
        let (service, log) = scripted_service();
        let mut status = service.subscribe_status();
        let mut events = service.subscribe_events();

        service.load_page(two_paragraphs(false));
        service.start_whole_document();

        let s = wait_for(&mut status, |s| s.active_paragraph_id == Some(ParagraphId(1))).await;
        assert!(s.is_global_playing);
        assert!(s.is_loading);
        assert_eq!(
            next_event(&mut events).await,
            NarrationEvent::BringIntoView { paragraph_id: ParagraphId(1) }
        );

        emit_latest(&log, Signal::Ready);
        wait_for(&mut status, |s| !s.is_loading).await;
        emit_latest(&log, Signal::Ended);
        wait_for(&mut status, |s| s.active_paragraph_id == Some(ParagraphId(2))).await;
        assert_eq!(
            next_event(&mut events).await,
            NarrationEvent::BringIntoView { paragraph_id: ParagraphId(2) }
        );

        emit_latest(&log, Signal::Ready);
        emit_latest(&log, Signal::Ended);
        let s = wait_for(&mut status, |s| s.mode == PlaybackMode::Idle).await;
        assert_eq!(s.active_paragraph_id, None);
        assert_eq!(next_event(&mut events).await, NarrationEvent::ArticleFinished);
    }

    #[tokio::test]
    async fn reports_page_boundary() {
        let (service, log) = scripted_service();
        let mut events = service.subscribe_events();

        service.load_page(two_paragraphs(true));
        service.start_whole_document();
        for _ in 0..2 {
            assert!(matches!(
                next_event(&mut events).await,
                NarrationEvent::BringIntoView { .. }
            ));
            emit_latest(&log, Signal::Error("404".into()));
            assert!(matches!(
                next_event(&mut events).await,
                NarrationEvent::ParagraphSkipped { .. }
            ));
        }
        assert_eq!(
            next_event(&mut events).await,
            NarrationEvent::PageBoundaryReached { page: 1 }
        );
        assert_eq!(service.status().mode, PlaybackMode::Idle);
    }

    #[tokio::test]
    async fn single_shot_replaces_sequence() {
        let (service, log) = scripted_service();
        let mut status = service.subscribe_status();

        service.load_page(two_paragraphs(false));
        service.start_whole_document();
        wait_for(&mut status, |s| s.is_global_playing).await;

        service.play_paragraph(ParagraphId(2));
        let s = wait_for(&mut status, |s| s.mode == PlaybackMode::SingleShotPlaying).await;
        assert_eq!(s.active_paragraph_id, Some(ParagraphId(2)));

        let handles = log.lock().unwrap().clone();
        assert_eq!(handles.len(), 2);
        assert!(handles[0].is_detached());
        assert!(!handles[1].is_detached());

        service.stop();
        wait_for(&mut status, |s| s.mode == PlaybackMode::Idle).await;
        assert!(log.lock().unwrap()[1].is_detached());
    }

    #[tokio::test]
    async fn stop_whole_document_returns_to_idle() {
        let (service, _log) = scripted_service();
        let mut status = service.subscribe_status();

        service.load_page(two_paragraphs(false));
        service.start_whole_document();
        wait_for(&mut status, |s| s.is_global_playing).await;
        service.stop_whole_document();
        let s = wait_for(&mut status, |s| !s.is_global_playing).await;
        assert_eq!(s.mode, PlaybackMode::Idle);
    }
}
