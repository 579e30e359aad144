//! Default configuration constants for latgen.
//!
//! Shared by the config file layer, the CLI and the component constructors
//! so every entry point agrees on the same numbers.

/// Default audio sample rate in Hz.
///
/// Input audio must already be at this rate; nothing is resampled.
pub const SAMPLE_RATE: u32 = 16000;

/// Analysis window length in milliseconds.
pub const FRAME_LENGTH_MS: u32 = 25;

/// Analysis window shift in milliseconds.
pub const FRAME_SHIFT_MS: u32 = 10;

/// Number of cepstral coefficients per frame.
pub const NUM_CEPS: usize = 13;

/// Number of triangular mel bins feeding the DCT.
pub const NUM_MEL_BINS: usize = 23;

/// Lowest mel filterbank edge in Hz.
pub const LOW_FREQ: f32 = 20.0;

/// Highest mel filterbank edge in Hz. Non-positive values are offsets from Nyquist.
pub const HIGH_FREQ: f32 = 0.0;

pub const PREEMPHASIS_COEFF: f32 = 0.97;

pub const CEPSTRAL_LIFTER: f32 = 22.0;

/// Order of temporal differencing (1 = deltas, 2 = delta-deltas).
pub const DELTA_ORDER: usize = 2;

/// Frames of left context for the feature transform.
///
/// With no projection matrix this must be a multiple of [`DELTA_ORDER`]:
/// each differencing order consumes `left_context / order` frames.
pub const LEFT_CONTEXT: usize = 4;

/// Frames of right context for the feature transform.
pub const RIGHT_CONTEXT: usize = 4;

/// Search beam (cost units relative to the best active token).
pub const BEAM: f32 = 16.0;

/// Upper bound on active tokens per frame.
pub const MAX_ACTIVE: usize = 7000;

/// Lower bound on active tokens per frame before the beam is widened.
pub const MIN_ACTIVE: usize = 20;

/// Beam used when pruning the lattice.
pub const LATTICE_BEAM: f32 = 10.0;

/// Frames between lattice pruning passes.
pub const PRUNE_INTERVAL: usize = 25;

/// Slack added to the beam when the active-token limits tighten or widen it.
pub const BEAM_DELTA: f32 = 0.5;

/// Fraction of the lattice beam used as the convergence tolerance of
/// periodic lattice pruning.
pub const PRUNE_SCALE: f32 = 0.1;

/// Scale applied to acoustic log-likelihoods during search.
///
/// Zero is reserved to mean "no scaling".
pub const ACOUSTIC_SCALE: f32 = 0.1;

/// Bytes per 16-bit PCM sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Samples fed per `feed_audio` call by the command-line decoder.
pub const BATCH_SAMPLES: usize = 2120;

/// Frames decoded per `decode` call by the command-line decoder.
pub const DECODE_BATCH_FRAMES: usize = 10;

/// Number of samples covered by `ms` milliseconds at `sample_rate`.
pub fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1000) as usize
}
