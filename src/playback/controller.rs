//! The playback controller: a handle plus the owning session task.
//!
//! ## Why an owning task:
//! The playback slot is touched from every HTTP request handler and from
//! the stream task reporting completion. Instead of a shared struct behind
//! a lock, one task owns the state and everything else sends it commands;
//! completion is just another message, carrying a token so a report from a
//! stream that was already superseded is ignored.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::audio::encoder::SoundEncoder;
use crate::audio::source::SampleSource;
use crate::error::AppError;
use crate::library::SoundLibrary;
use crate::playback::stream::{self, StreamTask};
use crate::voice::VoiceOutput;

/// Snapshot of the session for the status endpoint.
#[derive(Debug, Clone)]
pub struct PlaybackStatus {
    pub state: &'static str,
    pub current: Option<String>,
    /// Effective volume, 0.0 to 1.0 of hardware maximum
    pub effective_volume: f32,
    /// Configured ceiling, 0.0 to 1.0
    pub max_volume: f32,
}

pub(crate) enum Command {
    Play {
        name: String,
        reply: oneshot::Sender<Result<PathBuf, AppError>>,
    },
    SetVolume {
        percent: i64,
        reply: oneshot::Sender<Result<f32, AppError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<PlaybackStatus>,
    },
    Finished {
        token: u64,
    },
}

/// Cheap, cloneable handle into the session task.
#[derive(Clone)]
pub struct PlaybackController {
    tx: mpsc::UnboundedSender<Command>,
}

impl PlaybackController {
    /// Spawn the owning session task and return its handle.
    pub fn spawn(
        library: Arc<SoundLibrary>,
        voice: Arc<dyn VoiceOutput>,
        source: Arc<dyn SampleSource>,
        max_volume_percent: u32,
        bitrate: i32,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let max_volume = max_volume_percent as f32 / 100.0;
        let session = Session {
            library,
            voice,
            source,
            volume: Arc::new(RwLock::new(max_volume)),
            max_volume,
            bitrate,
            slot: Slot::Idle,
            next_token: 0,
            tx: tx.clone(),
        };
        tokio::spawn(session.run(rx));
        Self { tx }
    }

    /// Start playing `name`. Returns the resolved path on success.
    pub async fn play(&self, name: &str) -> Result<PathBuf, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Play {
            name: name.to_owned(),
            reply,
        })?;
        rx.await.map_err(Self::gone)?
    }

    /// Set the requested volume percentage; returns the effective volume.
    pub async fn set_volume(&self, percent: i64) -> Result<f32, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetVolume { percent, reply })?;
        rx.await.map_err(Self::gone)?
    }

    /// Signal the active stream to halt. Idempotent; fine when idle.
    pub async fn stop(&self) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply })?;
        rx.await.map_err(Self::gone)
    }

    pub async fn status(&self) -> Result<PlaybackStatus, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(Self::gone)
    }

    fn send(&self, cmd: Command) -> Result<(), AppError> {
        self.tx
            .send(cmd)
            .map_err(|_| AppError::Internal("playback session is gone".to_string()))
    }

    fn gone<E>(_: E) -> AppError {
        AppError::Internal("playback session is gone".to_string())
    }
}

/// The one playback slot.
enum Slot {
    Idle,
    Playing {
        token: u64,
        name: String,
        stop: watch::Sender<bool>,
    },
}

struct Session {
    library: Arc<SoundLibrary>,
    voice: Arc<dyn VoiceOutput>,
    source: Arc<dyn SampleSource>,
    /// Shared with the active stream task, which reads it per frame, so
    /// volume changes apply to playback already in flight.
    volume: Arc<RwLock<f32>>,
    max_volume: f32,
    bitrate: i32,
    slot: Slot,
    next_token: u64,
    tx: mpsc::UnboundedSender<Command>,
}

impl Session {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Play { name, reply } => {
                    let _ = reply.send(self.play(name).await);
                }
                Command::SetVolume { percent, reply } => {
                    let _ = reply.send(self.set_volume(percent));
                }
                Command::Stop { reply } => {
                    self.stop();
                    let _ = reply.send(());
                }
                Command::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                Command::Finished { token } => self.finished(token),
            }
        }
    }

    async fn play(&mut self, name: String) -> Result<PathBuf, AppError> {
        let path = self
            .library
            .resolve(&name)
            .ok_or_else(|| AppError::NotFound(format!("{}: file not found", name)))?
            .to_owned();

        if let Slot::Playing { .. } = self.slot {
            return Err(AppError::AlreadyPlaying);
        }

        // Decode before any state changes so a bad file leaves the
        // session untouched.
        let source = Arc::clone(&self.source);
        let decode_path = path.clone();
        let samples = tokio::task::spawn_blocking(move || source.load(&decode_path))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Playback(e.to_string()))?;

        let encoder =
            SoundEncoder::new(self.bitrate).map_err(|e| AppError::Playback(e.to_string()))?;

        self.next_token += 1;
        let token = self.next_token;
        let (stop_tx, stop_rx) = watch::channel(false);

        self.voice.set_self_deaf(false);
        self.voice.set_self_mute(false);

        tokio::spawn(stream::run(StreamTask {
            samples,
            encoder,
            volume: Arc::clone(&self.volume),
            voice: Arc::clone(&self.voice),
            stop: stop_rx,
            token,
            done: self.tx.clone(),
        }));

        info!(sound = %name, path = %path.display(), "playback started");
        self.slot = Slot::Playing {
            token,
            name,
            stop: stop_tx,
        };
        Ok(path)
    }

    fn set_volume(&mut self, percent: i64) -> Result<f32, AppError> {
        if !(0..=100).contains(&percent) {
            return Err(AppError::InvalidInput(format!(
                "number too small or too large: {}",
                percent
            )));
        }

        let effective = percent as f32 / 100.0 * self.max_volume;
        *self.volume.write().unwrap() = effective;
        info!(percent, effective = effective * 100.0, "volume changed");
        Ok(effective)
    }

    fn stop(&mut self) {
        if let Slot::Playing { name, stop, .. } = &self.slot {
            info!(sound = %name, "stopping playback");
            let _ = stop.send(true);
            // The slot transitions when the stream task reports Finished.
        }
    }

    fn finished(&mut self, token: u64) {
        match &self.slot {
            Slot::Playing { token: current, .. } if *current == token => {
                self.voice.set_self_deaf(true);
                self.slot = Slot::Idle;
                debug!("playback finished, self-deafened");
            }
            _ => debug!(token, "stale stream completion ignored"),
        }
    }

    fn status(&self) -> PlaybackStatus {
        let (state, current) = match &self.slot {
            Slot::Idle => ("idle", None),
            Slot::Playing { name, .. } => ("playing", Some(name.clone())),
        };
        PlaybackStatus {
            state,
            current,
            effective_volume: *self.volume.read().unwrap(),
            max_volume: self.max_volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encoder::FRAME_SIZE;
    use crate::audio::source::testing::StaticSource;
    use crate::voice::testing::{Recorded, RecordingVoice};
    use std::time::Duration;

    fn library_with(names: &[&str]) -> Arc<SoundLibrary> {
        Arc::new(SoundLibrary::from_entries(names.iter().map(|n| {
            ((*n).to_string(), PathBuf::from(format!("/sounds/{}", n)))
        })))
    }

    fn controller(
        names: &[&str],
        samples: Vec<f32>,
        max_volume_percent: u32,
    ) -> (PlaybackController, Arc<RecordingVoice>) {
        let voice = Arc::new(RecordingVoice::default());
        let controller = PlaybackController::spawn(
            library_with(names),
            Arc::clone(&voice) as Arc<dyn VoiceOutput>,
            Arc::new(StaticSource(samples)),
            max_volume_percent,
            64_000,
        );
        (controller, voice)
    }

    /// Two 20 ms frames of quiet noise.
    fn short_clip() -> Vec<f32> {
        (0..FRAME_SIZE * 2).map(|i| (i % 7) as f32 * 0.01).collect()
    }

    #[tokio::test]
    async fn test_unknown_name_is_not_found_and_mutates_nothing() {
        let (controller, voice) = controller(&[], short_clip(), 100);
        let err = controller.play("nope.mp3").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let status = controller.status().await.unwrap();
        assert_eq!(status.state, "idle");
        assert!(voice.events().is_empty());
    }

    #[tokio::test]
    async fn test_second_play_is_rejected_while_busy() {
        let clip: Vec<f32> = vec![0.0; FRAME_SIZE * 250]; // 5 s, keeps playing
        let (controller, _voice) = controller(&["beep.mp3"], clip, 100);

        let path = controller.play("beep.mp3").await.unwrap();
        assert_eq!(path, PathBuf::from("/sounds/beep.mp3"));

        let err = controller.play("beep.mp3").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyPlaying));

        let status = controller.status().await.unwrap();
        assert_eq!(status.state, "playing");
        assert_eq!(status.current.as_deref(), Some("beep.mp3"));
    }

    #[tokio::test]
    async fn test_completion_returns_to_idle_and_redeafens() {
        let (controller, voice) = controller(&["beep.mp3"], short_clip(), 100);
        controller.play("beep.mp3").await.unwrap();

        // Two frames take ~40 ms; leave generous slack.
        tokio::time::sleep(Duration::from_millis(400)).await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.state, "idle");

        let events = voice.events();
        assert_eq!(&events[..2], &[Recorded::Deaf(false), Recorded::Mute(false)]);
        assert_eq!(events.last(), Some(&Recorded::Deaf(true)));
        // The final audio frame is flagged as end-of-stream.
        let last_audio = events
            .iter()
            .rev()
            .find(|e| matches!(e, Recorded::Audio { .. }))
            .unwrap();
        assert!(matches!(last_audio, Recorded::Audio { end: true, .. }));
    }

    #[tokio::test]
    async fn test_stop_ends_playback() {
        let clip: Vec<f32> = vec![0.0; FRAME_SIZE * 500]; // 10 s
        let (controller, voice) = controller(&["long.mp3"], clip, 100);

        controller.play("long.mp3").await.unwrap();
        controller.stop().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = controller.status().await.unwrap();
        assert_eq!(status.state, "idle");
        assert_eq!(voice.events().last(), Some(&Recorded::Deaf(true)));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_a_no_op() {
        let (controller, voice) = controller(&[], short_clip(), 100);
        controller.stop().await.unwrap();
        let status = controller.status().await.unwrap();
        assert_eq!(status.state, "idle");
        assert!(voice.events().is_empty());
    }

    #[tokio::test]
    async fn test_volume_scales_against_the_ceiling() {
        let (controller, _voice) = controller(&[], short_clip(), 50);
        let effective = controller.set_volume(50).await.unwrap();
        assert!((effective - 0.25).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_volume_out_of_range_is_rejected() {
        let (controller, _voice) = controller(&[], short_clip(), 100);
        assert!(matches!(
            controller.set_volume(101).await.unwrap_err(),
            AppError::InvalidInput(_)
        ));
        assert!(matches!(
            controller.set_volume(-1).await.unwrap_err(),
            AppError::InvalidInput(_)
        ));
        // Prior volume (the ceiling) is unchanged.
        let status = controller.status().await.unwrap();
        assert!((status.effective_volume - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_undecodable_file_is_a_playback_error() {
        let (controller, voice) = controller(&["bad.mp3"], Vec::new(), 100);
        let err = controller.play("bad.mp3").await.unwrap_err();
        assert!(matches!(err, AppError::Playback(_)));

        let status = controller.status().await.unwrap();
        assert_eq!(status.state, "idle");
        assert!(voice.events().is_empty());
    }
}
