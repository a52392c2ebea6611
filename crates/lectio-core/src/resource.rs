//! Audio Resource Handle contract.
//!
//! A handle wraps one paragraph's audio as an external resource. Loading is
//! asynchronous: the backend reports progress by delivering [`ResourceEvent`]s
//! (ready, ended, error, load timeout) to the controller's event loop, each
//! stamped with the [`Ticket`] of the handle that produced it.
//!
//! Only [`crate::playback::PlaybackState`] acquires and releases handles.

use std::fmt;

use crate::types::{AudioSource, ParagraphId};

/// Generation number identifying one acquired handle.
///
/// Tickets only grow, so a signal carrying an old ticket can always be told
/// apart from one produced by the handle installed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle signal raised by a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Decodable enough to play without stalling.
    Ready,
    /// Playback completed naturally.
    Ended,
    /// Load, decode, or playback failed. Terminal: no `Ended` follows.
    Error(String),
    /// The safety timeout elapsed before `Ready` or `Error`.
    LoadTimeout,
}

/// A signal tagged with the handle that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    pub ticket: Ticket,
    pub signal: Signal,
}

impl ResourceEvent {
    pub fn new(ticket: Ticket, signal: Signal) -> Self {
        Self { ticket, signal }
    }
}

/// Raised synchronously when a ready resource refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("audio output unavailable")]
    OutputUnavailable,
    #[error("playback refused: {0}")]
    Refused(String),
}

/// What a paragraph acquisition asks the backend for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub ticket: Ticket,
    pub paragraph_id: ParagraphId,
    pub source: AudioSource,
}

/// Produces audio handles. Must not block: `acquire` starts loading and
/// returns at once, readiness arrives later as a [`Signal::Ready`].
pub trait AudioBackend {
    type Handle: AudioHandle;

    fn acquire(&mut self, request: AcquireRequest) -> Self::Handle;
}

/// One live audio resource.
pub trait AudioHandle {
    fn ticket(&self) -> Ticket;

    /// Start playback of a ready resource.
    fn play(&mut self) -> Result<(), ResourceError>;

    /// Stop playback, detach lifecycle signals, and free the resource.
    ///
    /// After this returns no further signal from this handle is delivered.
    /// Calling it twice is harmless.
    fn release(&mut self);
}
