//! Pull-based feature pipeline.
//!
//! ```text
//! AudioBuffer ──▶ FeatureExtractor ──▶ FeatureTransformer ──▶ FeatureMatrix ──▶ scorer
//!   (bytes)         (cepstra)          (deltas / projection)   (frame cache)
//! ```
//!
//! Every stage owns the stage before it and answers "give me the next
//! frame" with a [`FramePoll`]. Nothing blocks: a stage that lacks input
//! says [`FramePoll::Pending`] and the caller comes back after more audio
//! has been fed. Resetting a stage never resets its upstream; the
//! recognizer decides which stages to clear.

pub mod delta;
pub mod extractor;
pub mod matrix;
pub mod mfcc;
pub mod projection;
pub mod transform;

pub use delta::DeltaFeatures;
pub use extractor::FeatureExtractor;
pub use matrix::FeatureMatrix;
pub use mfcc::{ComputeFeatures, MfccComputer, MfccOptions};
pub use projection::{LinearProjection, TransformMatrix};
pub use transform::{FeatureTransform, FeatureTransformer};

/// Outcome of pulling one frame from a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePoll {
    /// The next frame, in temporal order.
    Ready(Vec<f32>),
    /// Not enough input buffered yet; try again after feeding more audio.
    Pending,
    /// Input has ended and every frame has been produced.
    Finished,
}

impl FramePoll {
    pub fn is_ready(&self) -> bool {
        matches!(self, FramePoll::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FramePoll::Pending)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, FramePoll::Finished)
    }
}

/// A restartable, finite-but-growing sequence of feature frames.
pub trait FrameSource {
    /// Length of every frame this source produces.
    fn dim(&self) -> usize;

    /// Pull the next frame.
    fn next_frame(&mut self) -> FramePoll;

    /// Discard internal state so the next frame is computed afresh.
    /// Upstream stages are left untouched.
    fn reset(&mut self);
}
