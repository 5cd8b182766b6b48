//! # Audio Pipeline
//!
//! Everything between a sound file on disk and the Opus frames shipped
//! into the voice channel:
//! - **source**: decode any supported container/codec to 48 kHz mono f32
//! - **encoder**: wrap the native Opus encoder for fixed 20 ms frames
//!
//! ## Stream Format:
//! - **Sample Rate**: 48 kHz (Opus native rate, what Mumble expects)
//! - **Channels**: Mono
//! - **Frame**: 960 samples (20 ms)

pub mod encoder;
pub mod source;

pub use encoder::{SoundEncoder, FRAME_SIZE, SAMPLE_RATE};
pub use source::{FileSource, SampleSource};
