//! # Application State
//!
//! State shared with every HTTP request handler. The sound library is
//! built once before the server starts and is read-only, so it needs no
//! locking; everything mutable lives behind the playback controller's
//! message channel.

use crate::config::AppConfig;
use crate::library::SoundLibrary;
use crate::playback::PlaybackController;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    /// Startup configuration snapshot
    pub config: AppConfig,

    /// Immutable name → path table
    pub library: Arc<SoundLibrary>,

    /// Handle into the playback session task
    pub playback: PlaybackController,

    /// When the server started
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        library: Arc<SoundLibrary>,
        playback: PlaybackController,
    ) -> Self {
        Self {
            config,
            library,
            playback,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
