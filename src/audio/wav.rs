//! WAV file loading for the command-line decoder and tests.

use crate::error::{LatgenError, Result};
use std::io::Read;
use std::path::Path;

/// Mono 16-bit PCM audio read from a WAV file.
///
/// Stereo input is downmixed. The sample rate is checked, never converted:
/// the decoder expects audio at exactly its configured rate.
#[derive(Debug, Clone)]
pub struct WavAudio {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl WavAudio {
    /// Parse WAV data from any reader, requiring `expected_rate`.
    pub fn from_reader<R: Read>(reader: R, expected_rate: u32) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| LatgenError::AudioRead {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.sample_rate != expected_rate {
            return Err(LatgenError::AudioFormatMismatch {
                expected: format!("{} Hz", expected_rate),
                actual: format!("{} Hz", spec.sample_rate),
            });
        }
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(LatgenError::AudioFormatMismatch {
                expected: "16-bit integer PCM".to_string(),
                actual: format!("{}-bit {:?}", spec.bits_per_sample, spec.sample_format),
            });
        }

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LatgenError::AudioRead {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let samples = match spec.channels {
            1 => raw_samples,
            2 => raw_samples
                .chunks_exact(2)
                .map(|pair| ((i32::from(pair[0]) + i32::from(pair[1])) / 2) as i16)
                .collect(),
            n => {
                return Err(LatgenError::AudioFormatMismatch {
                    expected: "mono or stereo".to_string(),
                    actual: format!("{} channels", n),
                });
            }
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Open and parse a WAV file.
    pub fn open(path: &Path, expected_rate: u32) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), expected_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Consume the audio and return the samples.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// Little-endian PCM bytes, `batch_samples` samples per chunk.
    ///
    /// This is the byte stream a live capture would hand to
    /// [`Recognizer::feed_audio`](crate::Recognizer::feed_audio).
    pub fn pcm_chunks(&self, batch_samples: usize) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.samples
            .chunks(batch_samples.max(1))
            .map(|chunk| chunk.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}
