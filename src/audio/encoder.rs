//! Opus encoder wrapper sized for the voice stream format.

use bytes::Bytes;

/// Opus native rate; also what the resampler targets.
pub const SAMPLE_RATE: u32 = 48_000;

/// Samples per 20 ms frame at 48 kHz mono.
pub const FRAME_SIZE: usize = 960;

/// Upper bound for one encoded packet; Opus recommends 4000 bytes.
const MAX_PACKET_SIZE: usize = 4000;

pub struct SoundEncoder {
    encoder: opus::Encoder,
}

impl SoundEncoder {
    /// Create an encoder for 48 kHz mono playback at the given bitrate.
    ///
    /// `Application::Audio` favors fidelity over the VoIP tuning; the
    /// soundboard streams music clips, not speech.
    pub fn new(bitrate: i32) -> Result<Self, opus::Error> {
        let mut encoder = opus::Encoder::new(
            SAMPLE_RATE,
            opus::Channels::Mono,
            opus::Application::Audio,
        )?;
        encoder.set_bitrate(opus::Bitrate::Bits(bitrate))?;
        encoder.set_vbr(true)?;
        Ok(Self { encoder })
    }

    /// Encode exactly one frame of `FRAME_SIZE` PCM samples.
    pub fn encode(&mut self, samples: &[f32]) -> Result<Bytes, opus::Error> {
        let mut output = vec![0u8; MAX_PACKET_SIZE];
        let len = self.encoder.encode_float(samples, &mut output)?;
        output.truncate(len);
        Ok(Bytes::from(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodes_a_full_frame() {
        let mut encoder = SoundEncoder::new(64_000).unwrap();
        let frame = vec![0.0f32; FRAME_SIZE];
        let packet = encoder.encode(&frame).unwrap();
        assert!(!packet.is_empty());
        assert!(packet.len() <= 4000);
    }

    #[test]
    fn test_rejects_partial_frame() {
        let mut encoder = SoundEncoder::new(64_000).unwrap();
        let short = vec![0.0f32; FRAME_SIZE / 3];
        assert!(encoder.encode(&short).is_err());
    }
}
