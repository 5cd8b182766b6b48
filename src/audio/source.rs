//! Sound file decoding.
//!
//! Decodes a file to the stream format (48 kHz mono f32) in one shot:
//! symphonia handles every container/codec the library is built with,
//! multi-channel audio is averaged down to mono, and rubato resamples
//! anything that is not already at 48 kHz. Soundboard clips are short, so
//! the whole file is decoded up front rather than streamed.

use anyhow::{anyhow, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::encoder::SAMPLE_RATE;

/// Source of decoded PCM for the playback controller. The controller only
/// ever asks for a fully decoded buffer, so tests can substitute canned
/// samples without touching the filesystem.
pub trait SampleSource: Send + Sync {
    /// Decode `path` to 48 kHz mono f32 samples.
    fn load(&self, path: &Path) -> Result<Vec<f32>>;
}

/// Production source backed by symphonia + rubato.
pub struct FileSource;

impl SampleSource for FileSource {
    fn load(&self, path: &Path) -> Result<Vec<f32>> {
        load_audio(path, SAMPLE_RATE)
    }
}

fn load_audio(path: &Path, target_sr: u32) -> Result<Vec<f32>> {
    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    // A hint from the file extension speeds up probing.
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no supported audio tracks"))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let track_id = track.id;

    let mut samples: Vec<f32> = Vec::new();
    let mut source_sr = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(err) => return Err(anyhow!(err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                source_sr = spec.rate;

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                let buf_samples = sample_buf.samples();

                if spec.channels.count() == 1 {
                    samples.extend_from_slice(buf_samples);
                } else {
                    // Average interleaved channels down to mono.
                    for frame in buf_samples.chunks(spec.channels.count()) {
                        let sum: f32 = frame.iter().sum();
                        samples.push(sum / spec.channels.count() as f32);
                    }
                }
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::DecodeError(_)) => (), // skip corrupt packets
            Err(err) => return Err(anyhow!(err)),
        }
    }

    if samples.is_empty() || source_sr == 0 {
        return Err(anyhow!("no audio data in {}", path.display()));
    }

    if source_sr != target_sr {
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let mut resampler = SincFixedIn::<f32>::new(
            target_sr as f64 / source_sr as f64,
            2.0,
            params,
            samples.len(),
            1,
        )?;

        let waves_in = vec![samples];
        let waves_out = resampler.process(&waves_in, None)?;
        samples = waves_out.into_iter().next().unwrap_or_default();
    }

    Ok(samples)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::SampleSource;
    use anyhow::{anyhow, Result};
    use std::path::Path;

    /// Canned samples regardless of path; errors if constructed empty.
    pub(crate) struct StaticSource(pub Vec<f32>);

    impl SampleSource for StaticSource {
        fn load(&self, _path: &Path) -> Result<Vec<f32>> {
            if self.0.is_empty() {
                return Err(anyhow!("undecodable"));
            }
            Ok(self.0.clone())
        }
    }
}
