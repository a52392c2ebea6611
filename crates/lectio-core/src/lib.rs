//! lectio-core: Pure types and the narration state machine.
//!
//! No async runtime, no I/O. Audio output is reached only through the
//! [`resource::AudioBackend`] trait; lectio-lib supplies the real one.

pub mod narrator;
pub mod playback;
pub mod resource;
pub mod text_prep;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use narrator::Narrator;
