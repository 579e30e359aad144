//! Context-window feature transform stage.

use crate::features::delta::DeltaFeatures;
use crate::features::projection::LinearProjection;
use crate::features::{FramePoll, FrameSource};
use std::collections::VecDeque;

/// The transform applied to each context window. Exactly one is chosen at
/// setup: a projection when a matrix file is given, deltas otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureTransform {
    Delta(DeltaFeatures),
    Projection(LinearProjection),
}

impl FeatureTransform {
    /// Frames of (left, right) context needed around each output frame.
    pub fn context(&self) -> (usize, usize) {
        match self {
            FeatureTransform::Delta(delta) => (delta.context(), delta.context()),
            FeatureTransform::Projection(proj) => proj.context(),
        }
    }

    pub fn output_dim(&self, input_dim: usize) -> usize {
        match self {
            FeatureTransform::Delta(delta) => delta.output_dim(input_dim),
            FeatureTransform::Projection(proj) => proj.output_dim(),
        }
    }

    fn apply(&self, window: &[&[f32]]) -> Vec<f32> {
        match self {
            FeatureTransform::Delta(delta) => delta.apply(window),
            FeatureTransform::Projection(proj) => proj.apply(window),
        }
    }
}

/// Applies a [`FeatureTransform`] to the frames of an upstream source.
///
/// Output frame `t` is emitted once raw frame `t + right` has arrived, or
/// once upstream has finished. Context that falls outside the stream is
/// filled by repeating the first or last raw frame.
pub struct FeatureTransformer<S: FrameSource> {
    source: S,
    transform: FeatureTransform,
    left: usize,
    right: usize,
    /// Raw frames still needed as context; `history[0]` has index `history_start`.
    history: VecDeque<Vec<f32>>,
    history_start: usize,
    raw_received: usize,
    next_output: usize,
    source_finished: bool,
}

impl<S: FrameSource> FeatureTransformer<S> {
    pub fn new(source: S, transform: FeatureTransform) -> Self {
        let (left, right) = transform.context();
        Self {
            source,
            transform,
            left,
            right,
            history: VecDeque::new(),
            history_start: 0,
            raw_received: 0,
            next_output: 0,
            source_finished: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn transform(&self) -> &FeatureTransform {
        &self.transform
    }

    /// Pull raw frames until output `t` can be computed or upstream stalls.
    fn fill_until(&mut self, t: usize) {
        while !self.source_finished && self.raw_received <= t + self.right {
            match self.source.next_frame() {
                FramePoll::Ready(frame) => {
                    self.history.push_back(frame);
                    self.raw_received += 1;
                }
                FramePoll::Pending => return,
                FramePoll::Finished => self.source_finished = true,
            }
        }
    }

    fn raw(&self, index: usize) -> &[f32] {
        &self.history[index - self.history_start]
    }
}

impl<S: FrameSource> FrameSource for FeatureTransformer<S> {
    fn dim(&self) -> usize {
        self.transform.output_dim(self.source.dim())
    }

    fn next_frame(&mut self) -> FramePoll {
        let t = self.next_output;
        self.fill_until(t);

        let has_right_context = self.raw_received > t + self.right;
        let can_flush = self.source_finished && t < self.raw_received;
        if !has_right_context && !can_flush {
            return if self.source_finished {
                FramePoll::Finished
            } else {
                FramePoll::Pending
            };
        }

        let last = (self.raw_received - 1) as isize;
        let window: Vec<&[f32]> = (t as isize - self.left as isize..=(t + self.right) as isize)
            .map(|i| self.raw(i.clamp(0, last) as usize))
            .collect();
        let output = self.transform.apply(&window);

        self.next_output += 1;
        // Keep only what output t+1 can still reach.
        let keep_from = (t + 1).saturating_sub(self.left);
        while self.history_start < keep_from && self.history.len() > 1 {
            self.history.pop_front();
            self.history_start += 1;
        }

        FramePoll::Ready(output)
    }

    fn reset(&mut self) {
        self.history.clear();
        self.history_start = 0;
        self.raw_received = 0;
        self.next_output = 0;
        self.source_finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::projection::TransformMatrix;
    use crate::features::testing::MockFrameSource;

    /// Projection that splices a 1-d stream: output = the raw window itself.
    fn splice(left: usize, right: usize) -> FeatureTransform {
        let width = left + 1 + right;
        let rows = (0..width)
            .map(|r| (0..width).map(|c| if r == c { 1.0 } else { 0.0 }).collect())
            .collect();
        let matrix = TransformMatrix::from_rows(rows).unwrap();
        FeatureTransform::Projection(LinearProjection::new(matrix, left, right, 1).unwrap())
    }

    fn collect_ready<S: FrameSource>(stage: &mut S) -> (Vec<Vec<f32>>, FramePoll) {
        let mut out = Vec::new();
        loop {
            match stage.next_frame() {
                FramePoll::Ready(frame) => out.push(frame),
                other => return (out, other),
            }
        }
    }

    #[test]
    fn waits_for_right_context() {
        let source = MockFrameSource::new(1).with_scalar_frames(&[0.0, 1.0]);
        let mut stage = FeatureTransformer::new(source, splice(1, 2));

        assert_eq!(stage.next_frame(), FramePoll::Pending);

        stage.source_mut().push_scalar_frames(&[2.0]);
        assert_eq!(stage.next_frame(), FramePoll::Ready(vec![0.0, 0.0, 1.0, 2.0]));
        assert_eq!(stage.next_frame(), FramePoll::Pending);
    }

    #[test]
    fn pads_edges_by_replication_at_end_of_stream() {
        let source = MockFrameSource::new(1).with_scalar_frames(&[0.0, 1.0, 2.0]);
        let mut stage = FeatureTransformer::new(source, splice(1, 1));
        stage.source_mut().finish();

        let (frames, tail) = collect_ready(&mut stage);
        assert_eq!(
            frames,
            vec![
                vec![0.0, 0.0, 1.0],
                vec![0.0, 1.0, 2.0],
                vec![1.0, 2.0, 2.0],
            ]
        );
        assert_eq!(tail, FramePoll::Finished);
    }

    #[test]
    fn output_count_matches_input_count() {
        let values: Vec<f32> = (0..20).map(|v| v as f32).collect();
        let source = MockFrameSource::new(3).with_scalar_frames(&values);
        let mut stage = FeatureTransformer::new(
            source,
            FeatureTransform::Delta(DeltaFeatures::new(2, 2)),
        );
        assert_eq!(stage.dim(), 9);

        let (before_finish, _) = collect_ready(&mut stage);
        assert_eq!(before_finish.len(), 20 - 4);

        stage.source_mut().finish();
        let (after_finish, tail) = collect_ready(&mut stage);
        assert_eq!(after_finish.len(), 4);
        assert_eq!(tail, FramePoll::Finished);
    }

    #[test]
    fn history_stays_bounded() {
        let values: Vec<f32> = (0..200).map(|v| v as f32).collect();
        let source = MockFrameSource::new(1).with_scalar_frames(&values);
        let mut stage = FeatureTransformer::new(source, splice(2, 2));

        let (frames, _) = collect_ready(&mut stage);
        assert_eq!(frames.len(), 198);
        assert!(stage.history.len() <= 2 + 1 + 2 + 1);
        assert_eq!(frames[100], vec![98.0, 99.0, 100.0, 101.0, 102.0]);
    }

    #[test]
    fn reset_clears_context_but_not_upstream() {
        let source = MockFrameSource::new(1).with_scalar_frames(&[5.0, 6.0, 7.0]);
        let mut stage = FeatureTransformer::new(source, splice(1, 1));
        assert!(stage.next_frame().is_ready());

        stage.reset();

        assert_eq!(stage.source().resets, 0);
        stage.source_mut().push_scalar_frames(&[8.0]);
        // Context restarts from the next raw frame (7.0) with left padding
        assert_eq!(stage.next_frame(), FramePoll::Ready(vec![7.0, 7.0, 8.0]));
    }

    #[test]
    fn empty_stream_finishes_immediately() {
        let mut source = MockFrameSource::new(1);
        source.finish();
        let mut stage = FeatureTransformer::new(source, splice(1, 1));
        assert_eq!(stage.next_frame(), FramePoll::Finished);
    }
}
