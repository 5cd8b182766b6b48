//! The stream task: paces one decoded clip into the voice session.
//!
//! Frames are emitted on a 20 ms interval, scaled by the shared volume at
//! the moment each frame is cut, encoded, and handed to the voice session.
//! Whatever ends the stream — running out of samples, a stop signal, or an
//! encoder failure — the task reports `Finished` back to the session owner
//! and lets it do the state transition.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::audio::encoder::{SoundEncoder, FRAME_SIZE};
use crate::playback::controller::Command;
use crate::voice::VoiceOutput;

const FRAME_INTERVAL: Duration = Duration::from_millis(20);

pub(crate) struct StreamTask {
    pub(crate) samples: Vec<f32>,
    pub(crate) encoder: SoundEncoder,
    pub(crate) volume: Arc<RwLock<f32>>,
    pub(crate) voice: Arc<dyn VoiceOutput>,
    pub(crate) stop: watch::Receiver<bool>,
    pub(crate) token: u64,
    pub(crate) done: mpsc::UnboundedSender<Command>,
}

pub(crate) async fn run(mut task: StreamTask) {
    let mut interval = tokio::time::interval(FRAME_INTERVAL);
    // Never burst frames after a stall; late is better than flooding.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let total = task.samples.len();
    let mut offset = 0;
    let mut frame = [0.0f32; FRAME_SIZE];

    while offset < total {
        tokio::select! {
            _ = task.stop.changed() => break,
            _ = interval.tick() => {}
        }

        let end = (offset + FRAME_SIZE).min(total);
        let chunk = &task.samples[offset..end];
        frame[..chunk.len()].copy_from_slice(chunk);
        // Zero-pad the tail so the encoder always sees a full frame.
        frame[chunk.len()..].fill(0.0);

        let gain = *task.volume.read().unwrap();
        for sample in frame.iter_mut() {
            *sample *= gain;
        }

        let last = end == total;
        match task.encoder.encode(&frame) {
            Ok(bytes) => task.voice.send_audio(bytes, last),
            Err(e) => {
                warn!(error = %e, "opus encode failed, aborting stream");
                break;
            }
        }
        offset = end;
    }

    let _ = task.done.send(Command::Finished { token: task.token });
}
