//! Delivery of resource lifecycle signals into the driver task.
//!
//! Each acquired handle gets its own [`HandleSignals`] carrying a detach flag.
//! Once the handle is released the flag is set and every later signal from
//! that handle's tasks or the playback thread is dropped at the source.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use lectio_core::resource::{ResourceEvent, Signal, Ticket};

/// Receiving end owned by the driver task.
pub type SignalReceiver = mpsc::UnboundedReceiver<ResourceEvent>;

/// Shared sender handed to an audio backend.
#[derive(Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<ResourceEvent>,
}

impl SignalSender {
    pub fn channel() -> (Self, SignalReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Signals for one newly acquired handle.
    pub fn scoped(&self, ticket: Ticket) -> HandleSignals {
        HandleSignals {
            ticket,
            tx: self.tx.clone(),
            detached: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Per-handle signal emitter. Cheap to clone into tasks and threads.
#[derive(Clone)]
pub struct HandleSignals {
    ticket: Ticket,
    tx: mpsc::UnboundedSender<ResourceEvent>,
    detached: Arc<AtomicBool>,
}

impl HandleSignals {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn emit(&self, signal: Signal) {
        if self.is_detached() {
            debug!("signals: {} detached, dropping {:?}", self.ticket, signal);
            return;
        }
        let _ = self.tx.send(ResourceEvent::new(self.ticket, signal));
    }

    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_tagged_signals() {
        let (sender, mut rx) = SignalSender::channel();
        let signals = sender.scoped(Ticket(3));
        signals.emit(Signal::Ready);
        assert_eq!(rx.try_recv().unwrap(), ResourceEvent::new(Ticket(3), Signal::Ready));
    }

    #[test]
    fn detached_handle_is_silent() {
        let (sender, mut rx) = SignalSender::channel();
        let signals = sender.scoped(Ticket(1));
        let clone = signals.clone();
        signals.detach();
        clone.emit(Signal::Ended);
        assert!(clone.is_detached());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn detach_is_per_handle() {
        let (sender, mut rx) = SignalSender::channel();
        let old = sender.scoped(Ticket(1));
        let new = sender.scoped(Ticket(2));
        old.detach();
        old.emit(Signal::Ended);
        new.emit(Signal::Ready);
        assert_eq!(rx.try_recv().unwrap().ticket, Ticket(2));
        assert!(rx.try_recv().is_err());
    }
}
