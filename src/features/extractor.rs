//! Sliding-window feature extraction over the audio buffer.

use crate::audio::AudioBuffer;
use crate::features::mfcc::{ComputeFeatures, MfccComputer};
use crate::features::{FramePoll, FrameSource};

/// Cuts fixed-length, fixed-stride windows from an [`AudioBuffer`] and
/// turns each into a feature vector.
///
/// Samples are consumed from the buffer as the window advances. The
/// overlap between consecutive windows (`frame_length - frame_shift`
/// samples) is kept here, so the buffer cursor only ever moves forward.
pub struct FeatureExtractor<C: ComputeFeatures = MfccComputer> {
    audio: AudioBuffer,
    computer: C,
    frame_length: usize,
    frame_shift: usize,
    /// Samples of the window currently being assembled.
    window: Vec<f32>,
    frames_produced: usize,
}

impl<C: ComputeFeatures> FeatureExtractor<C> {
    pub fn new(audio: AudioBuffer, computer: C, frame_length: usize, frame_shift: usize) -> Self {
        debug_assert!(frame_shift > 0 && frame_shift <= frame_length);
        Self {
            audio,
            computer,
            frame_length,
            frame_shift,
            window: Vec::with_capacity(frame_length),
            frames_produced: 0,
        }
    }

    pub fn audio(&self) -> &AudioBuffer {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioBuffer {
        &mut self.audio
    }

    /// Frames produced since the last reset.
    pub fn frames_produced(&self) -> usize {
        self.frames_produced
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn frame_shift(&self) -> usize {
        self.frame_shift
    }
}

impl<C: ComputeFeatures> FrameSource for FeatureExtractor<C> {
    fn dim(&self) -> usize {
        self.computer.dim()
    }

    fn next_frame(&mut self) -> FramePoll {
        let missing = self.frame_length.saturating_sub(self.window.len());
        if missing > 0 {
            self.audio.read_into(&mut self.window, missing);
        }

        if self.window.len() < self.frame_length {
            // A trailing partial window is never turned into a frame.
            return if self.audio.is_finished() {
                FramePoll::Finished
            } else {
                FramePoll::Pending
            };
        }

        let features = self.computer.compute(&self.window);
        self.window.drain(..self.frame_shift);
        self.frames_produced += 1;
        FramePoll::Ready(features)
    }

    fn reset(&mut self) {
        self.window.clear();
        self.frames_produced = 0;
    }
}
