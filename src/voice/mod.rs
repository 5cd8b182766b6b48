//! # Voice Session
//!
//! The live connection to the Mumble server: TLS control channel, channel
//! membership, self-mute/deafen state, and the audio tunnel. The wire
//! format itself is delegated to the `mumble-protocol` crate; this module
//! only drives the handshake and owns the connection task.
//!
//! The playback controller talks to the session through the small
//! [`VoiceOutput`] trait so tests can substitute a recording mock.

pub mod channel;
pub mod connection;

pub use connection::{connect, VoiceConnection, VoiceHandle};

use bytes::Bytes;

/// Controller-facing surface of the voice session.
///
/// Methods are fire-and-forget: they queue a command for the connection
/// task and never block, matching the contract that `Stop`/mute changes
/// carry no acknowledgement.
pub trait VoiceOutput: Send + Sync {
    fn set_self_mute(&self, mute: bool);

    fn set_self_deaf(&self, deaf: bool);

    /// Queue one encoded Opus frame; `end` marks the final frame of a
    /// stream so the server can flush its jitter buffer.
    fn send_audio(&self, frame: Bytes, end: bool);
}
