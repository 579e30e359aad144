//! Audio input: the producer-facing sample buffer and WAV file loading.

pub mod buffer;
pub mod wav;

pub use buffer::AudioBuffer;
pub use wav::WavAudio;
