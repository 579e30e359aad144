//! Frame-addressable cache of transformed features.

use crate::features::{FramePoll, FrameSource};

/// Growable matrix of feature frames, filled on demand from a [`FrameSource`].
///
/// Decouples the decoder's random access by frame index from the forward-only
/// production of the stages upstream. Frames are never evicted before
/// [`reset`](FeatureMatrix::reset); frame `i` is available exactly when
/// `i + 1` frames have been produced since then.
pub struct FeatureMatrix<S: FrameSource> {
    source: S,
    dim: usize,
    data: Vec<f32>,
    num_frames: usize,
    finished: bool,
}

impl<S: FrameSource> FeatureMatrix<S> {
    pub fn new(source: S) -> Self {
        let dim = source.dim();
        Self {
            source,
            dim,
            data: Vec::new(),
            num_frames: 0,
            finished: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Pull from upstream until frame `index` is cached or upstream stalls.
    ///
    /// Returns whether the frame is now available.
    pub fn ensure_frame(&mut self, index: usize) -> bool {
        while self.num_frames <= index {
            if self.finished {
                return false;
            }
            match self.source.next_frame() {
                FramePoll::Ready(frame) => {
                    debug_assert_eq!(frame.len(), self.dim);
                    self.data.extend_from_slice(&frame);
                    self.num_frames += 1;
                }
                FramePoll::Pending => return false,
                FramePoll::Finished => self.finished = true,
            }
        }
        true
    }

    /// Non-pulling readiness check.
    pub fn is_ready(&self, index: usize) -> bool {
        index < self.num_frames
    }

    /// Cached frame `index`, if it has been produced.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        self.is_ready(index)
            .then(|| &self.data[index * self.dim..(index + 1) * self.dim])
    }

    /// True once upstream has reported end of stream and `index` is the final frame or beyond.
    pub fn is_last_frame(&mut self, index: usize) -> bool {
        if self.ensure_frame(index + 1) {
            return false;
        }
        self.finished && index + 1 >= self.num_frames
    }

    /// Frames cached so far.
    pub fn num_frames_ready(&self) -> usize {
        self.num_frames
    }

    /// True once upstream has reported end of stream.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drop every cached frame.
    pub fn reset(&mut self) {
        self.data.clear();
        self.num_frames = 0;
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing::MockFrameSource;

    fn matrix(values: &[f32]) -> FeatureMatrix<MockFrameSource> {
        FeatureMatrix::new(MockFrameSource::new(2).with_scalar_frames(values))
    }

    #[test]
    fn ensure_frame_pulls_lazily() {
        let mut m = matrix(&[1.0, 2.0, 3.0]);
        assert_eq!(m.num_frames_ready(), 0);

        assert!(m.ensure_frame(1));
        assert_eq!(m.num_frames_ready(), 2);
        assert_eq!(m.frame(1), Some(&[2.0, 2.0][..]));
        assert_eq!(m.frame(2), None);
    }

    #[test]
    fn ensure_frame_reports_not_ready_without_blocking() {
        let mut m = matrix(&[1.0]);
        assert!(!m.ensure_frame(3));
        assert_eq!(m.num_frames_ready(), 1);
        assert!(!m.is_finished());

        m.source_mut().push_scalar_frames(&[2.0, 3.0, 4.0]);
        assert!(m.ensure_frame(3));
    }

    #[test]
    fn frames_become_ready_in_order() {
        let mut m = matrix(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        for i in [4usize, 1, 3] {
            m.ensure_frame(i);
            for j in 1..=i {
                assert!(!m.is_ready(j) || m.is_ready(j - 1));
            }
        }
    }

    #[test]
    fn is_last_frame_needs_end_of_stream() {
        let mut m = matrix(&[1.0, 2.0]);
        assert!(!m.is_last_frame(1));

        m.source_mut().finish();
        assert!(!m.is_last_frame(0));
        assert!(m.is_last_frame(1));
    }

    #[test]
    fn frames_past_the_end_count_as_last() {
        let mut m = matrix(&[1.0, 2.0]);
        assert!(!m.is_last_frame(5));

        m.source_mut().finish();
        assert!(m.is_last_frame(2));
        assert!(m.is_last_frame(5));
        assert_eq!(m.num_frames_ready(), 2);
    }

    #[test]
    fn reset_clears_cache_only() {
        let mut m = matrix(&[1.0, 2.0, 3.0]);
        m.ensure_frame(0);

        m.reset();
        m.reset();

        assert_eq!(m.num_frames_ready(), 0);
        assert!(m.frame(0).is_none());
        assert_eq!(m.source().resets, 0);
        // Upstream continues where it left off
        assert!(m.ensure_frame(0));
        assert_eq!(m.frame(0), Some(&[2.0, 2.0][..]));
    }
}
