//! lectio-lib: Narration runtime.
//!
//! Audio fetch, rodio playback, the driver task that owns the narration state
//! machine, page fetching, and the HTTP control API. Depends on lectio-core
//! for types and the state machine itself.

pub mod api;
pub mod audio;
pub mod error;
pub mod pages;
pub mod provider;
pub mod server;
pub mod service;
pub mod session;
pub mod signals;

pub use error::{Error, Result};

// Re-export lectio-core for convenience
pub use lectio_core;
