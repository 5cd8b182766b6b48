//! # Playback Session
//!
//! The single authority over "is a sound currently playing". All state —
//! the one playback slot, the effective volume, the mute/deafen side
//! effects — is owned by one task and mutated only through messages, so a
//! play request can never race a completion callback.
//!
//! ## Session Lifecycle:
//! 1. **Idle**: self-deafened, waiting for a play request
//! 2. **Playing**: un-muted, one stream task pacing frames into the voice
//!    session; further play requests are rejected (no queueing)
//! 3. back to **Idle** when the stream finishes or is stopped; the
//!    session re-deafens itself

pub mod controller;
mod stream;

pub use controller::{PlaybackController, PlaybackStatus};
