//! Acoustic scoring behind the index-based decodable interface.

use crate::features::{FeatureMatrix, FrameSource};
use crate::model::AcousticModel;
use std::sync::Arc;

/// What graph search needs from the acoustic side: a score per
/// (frame, transition id) and knowledge of where the input ends.
///
/// Frame queries may pull more features from upstream, hence `&mut self`.
pub trait Decodable {
    /// Scaled log-likelihood of `transition_id` at `frame`.
    ///
    /// `frame` must already be ready (see [`is_frame_ready`](Self::is_frame_ready)).
    fn log_likelihood(&mut self, frame: usize, transition_id: u32) -> f32;

    /// Whether `frame` can be scored now. Never blocks.
    fn is_frame_ready(&mut self, frame: usize) -> bool;

    /// Whether end of input has been signalled and `frame` is the final frame.
    fn is_last_frame(&mut self, frame: usize) -> bool;
}

/// Applies the acoustic scale to a raw model score.
///
/// A scale of zero means "unscaled": the raw score is returned.
pub fn apply_acoustic_scale(score: f32, acoustic_scale: f32) -> f32 {
    if acoustic_scale == 0.0 {
        score
    } else {
        score * acoustic_scale
    }
}

/// Scores cached feature frames with a GMM acoustic model.
///
/// Pdf likelihoods are memoised for the most recently scored frame, since
/// many transition ids share one pdf.
pub struct GmmScorer<S: FrameSource> {
    model: Arc<AcousticModel>,
    features: FeatureMatrix<S>,
    acoustic_scale: f32,
    cached_frame: Option<usize>,
    pdf_cache: Vec<Option<f32>>,
}

impl<S: FrameSource> GmmScorer<S> {
    pub fn new(model: Arc<AcousticModel>, features: FeatureMatrix<S>, acoustic_scale: f32) -> Self {
        let num_pdfs = model.num_pdfs();
        Self {
            model,
            features,
            acoustic_scale,
            cached_frame: None,
            pdf_cache: vec![None; num_pdfs],
        }
    }

    /// The scale applied to every score; lattice extraction divides it back out.
    pub fn acoustic_scale(&self) -> f32 {
        self.acoustic_scale
    }

    pub fn model(&self) -> &Arc<AcousticModel> {
        &self.model
    }

    pub fn features(&self) -> &FeatureMatrix<S> {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut FeatureMatrix<S> {
        &mut self.features
    }

    /// Clears the feature cache and memoised scores. Upstream stages are untouched.
    pub fn reset(&mut self) {
        self.features.reset();
        self.cached_frame = None;
        self.pdf_cache.iter_mut().for_each(|slot| *slot = None);
    }

    fn pdf_log_likelihood(&mut self, frame: usize, pdf: usize) -> f32 {
        if self.cached_frame != Some(frame) {
            self.pdf_cache.iter_mut().for_each(|slot| *slot = None);
            self.cached_frame = Some(frame);
        }
        if let Some(Some(score)) = self.pdf_cache.get(pdf) {
            return *score;
        }
        let Some(features) = self.features.frame(frame) else {
            debug_assert!(false, "frame {frame} scored before it was ready");
            return f32::NEG_INFINITY;
        };
        let score = self
            .model
            .log_likelihood(pdf, features)
            .unwrap_or(f32::NEG_INFINITY);
        if let Some(slot) = self.pdf_cache.get_mut(pdf) {
            *slot = Some(score);
        }
        score
    }
}

impl<S: FrameSource> Decodable for GmmScorer<S> {
    fn log_likelihood(&mut self, frame: usize, transition_id: u32) -> f32 {
        if !self.features.ensure_frame(frame) {
            debug_assert!(false, "frame {frame} scored before it was ready");
            return f32::NEG_INFINITY;
        }
        let Some(pdf) = self.model.transitions().pdf(transition_id) else {
            return f32::NEG_INFINITY;
        };
        let raw = self.pdf_log_likelihood(frame, pdf);
        apply_acoustic_scale(raw, self.acoustic_scale)
    }

    fn is_frame_ready(&mut self, frame: usize) -> bool {
        self.features.ensure_frame(frame)
    }

    fn is_last_frame(&mut self, frame: usize) -> bool {
        self.features.is_last_frame(frame)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Decodable;

    /// Table-driven decodable: `scores[frame][transition_id - 1]`, already scaled.
    pub struct MockDecodable {
        scores: Vec<Vec<f32>>,
        available: usize,
        finished: bool,
    }

    impl MockDecodable {
        pub fn new(scores: Vec<Vec<f32>>) -> Self {
            let available = scores.len();
            Self {
                scores,
                available,
                finished: true,
            }
        }

        /// Only the first `frames` frames are ready, and more may come.
        pub fn with_available(mut self, frames: usize) -> Self {
            self.available = frames.min(self.scores.len());
            self.finished = false;
            self
        }

        pub fn make_available(&mut self, frames: usize) {
            self.available = frames.min(self.scores.len());
            self.finished = self.available == self.scores.len();
        }
    }

    impl Decodable for MockDecodable {
        fn log_likelihood(&mut self, frame: usize, transition_id: u32) -> f32 {
            self.scores[frame][transition_id as usize - 1]
        }

        fn is_frame_ready(&mut self, frame: usize) -> bool {
            frame < self.available
        }

        fn is_last_frame(&mut self, frame: usize) -> bool {
            self.finished && frame + 1 >= self.available
        }
    }
}
