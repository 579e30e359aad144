//! Streaming recognizer: owns the whole pipeline from raw audio bytes to
//! lattices.
//!
//! ```text
//! feed_audio ──▶ AudioBuffer ─▶ FeatureExtractor ─▶ FeatureTransformer
//!                                                          │
//!        LatticeDecoder ◀── GmmScorer ◀── FeatureMatrix ◀──┘
//! ```
//!
//! Audio and decode requests may interleave freely. `decode` only advances
//! as far as the buffered audio allows and never blocks waiting for more.

use crate::audio::AudioBuffer;
use crate::config::{Config, ResourcePaths};
use crate::decoder::{BestPath, DecoderState, LatticeDecoder};
use crate::error::{LatgenError, Result};
use crate::features::{
    DeltaFeatures, FeatureExtractor, FeatureMatrix, FeatureTransform, FeatureTransformer,
    FrameSource, LinearProjection, MfccComputer, MfccOptions,
};
use crate::graph::SymbolTable;
use crate::lattice::{CompactLattice, Lattice};
use crate::model::AcousticModel;
use crate::resources::{FileLoader, ResourceLoader};
use crate::scorer::GmmScorer;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Feature stages upstream of the matrix cache.
pub type FeaturePipeline = FeatureTransformer<FeatureExtractor<MfccComputer>>;

pub struct Recognizer {
    scorer: GmmScorer<FeaturePipeline>,
    decoder: LatticeDecoder,
    symbols: SymbolTable,
    silence_phones: HashSet<u32>,
}

impl Recognizer {
    /// Build a recognizer from files on disk.
    pub fn setup(config: &Config, paths: &ResourcePaths) -> Result<Self> {
        Self::with_loader(config, paths, &FileLoader)
    }

    /// Build a recognizer, reading resources through `loader`.
    ///
    /// The configuration is validated before anything is loaded. If any
    /// load or consistency check fails, everything constructed so far is
    /// released before the error is returned.
    pub fn with_loader(
        config: &Config,
        paths: &ResourcePaths,
        loader: &dyn ResourceLoader,
    ) -> Result<Self> {
        config.validate(paths.transform.is_some())?;

        let model = loader.load_model(&paths.model)?;
        let graph = loader.load_graph(&paths.graph)?;
        let num_transition_ids = model.transitions().num_transition_ids();
        if graph.max_input_label() as usize > num_transition_ids {
            return Err(LatgenError::GraphLoad {
                path: paths.graph.display().to_string(),
                message: format!(
                    "input label {} exceeds the model's {} transition ids",
                    graph.max_input_label(),
                    num_transition_ids
                ),
            });
        }
        let symbols = loader.load_symbols(&paths.word_symbols)?;

        let mfcc = MfccComputer::new(MfccOptions::from_config(&config.audio, &config.mfcc));
        let extractor = FeatureExtractor::new(
            AudioBuffer::new(),
            mfcc,
            config.audio.frame_length_samples(),
            config.audio.frame_shift_samples(),
        );

        let features = &config.features;
        let transform = match &paths.transform {
            Some(path) => {
                let matrix = loader.load_transform(path)?;
                FeatureTransform::Projection(LinearProjection::new(
                    matrix,
                    features.left_context,
                    features.right_context,
                    extractor.dim(),
                )?)
            }
            None => FeatureTransform::Delta(DeltaFeatures::new(
                features.delta_order,
                features.delta_window(),
            )),
        };
        let transformer = FeatureTransformer::new(extractor, transform);

        if transformer.dim() != model.dim() {
            return Err(LatgenError::DimensionMismatch {
                context: "acoustic model input".to_string(),
                expected: model.dim(),
                actual: transformer.dim(),
            });
        }

        let scorer = GmmScorer::new(
            model,
            FeatureMatrix::new(transformer),
            config.decoder.acoustic_scale,
        );
        let decoder = LatticeDecoder::new(graph, config.decoder.clone());

        info!(
            model = %paths.model.display(),
            graph = %paths.graph.display(),
            pdfs = scorer.model().num_pdfs(),
            graph_states = decoder.graph().num_states(),
            words = symbols.len(),
            feature_dim = scorer.model().dim(),
            projection = paths.transform.is_some(),
            acoustic_scale = config.decoder.acoustic_scale,
            "Recognizer ready"
        );

        Ok(Self {
            scorer,
            decoder,
            symbols,
            silence_phones: paths
                .silence_phones
                .iter()
                .filter_map(|&p| u32::try_from(p).ok())
                .collect(),
        })
    }

    fn transformer(&self) -> &FeaturePipeline {
        self.scorer.features().source()
    }

    fn transformer_mut(&mut self) -> &mut FeaturePipeline {
        self.scorer.features_mut().source_mut()
    }

    fn extractor_mut(&mut self) -> &mut FeatureExtractor<MfccComputer> {
        self.transformer_mut().source_mut()
    }

    fn audio(&self) -> &AudioBuffer {
        self.transformer().source().audio()
    }

    fn audio_mut(&mut self) -> &mut AudioBuffer {
        self.extractor_mut().audio_mut()
    }

    /// Append raw 16-bit little-endian PCM bytes.
    pub fn feed_audio(&mut self, bytes: &[u8]) {
        self.audio_mut().write(bytes);
    }

    /// Signal that no more audio will arrive for this utterance, so the
    /// trailing frames can be flushed.
    pub fn input_finished(&mut self) {
        self.audio_mut().finish();
    }

    /// Decode up to `max_frames` more frames; returns how many were consumed.
    pub fn decode(&mut self, max_frames: usize) -> usize {
        self.decoder.decode(&mut self.scorer, max_frames)
    }

    pub fn best_path(&self) -> Option<BestPath> {
        self.decoder.best_path(self.scorer.acoustic_scale())
    }

    pub fn raw_lattice(&self) -> Option<Lattice> {
        self.decoder.raw_lattice(self.scorer.acoustic_scale())
    }

    pub fn lattice(&self) -> Option<CompactLattice> {
        self.decoder.lattice(self.scorer.acoustic_scale())
    }

    pub fn prune_final(&mut self) {
        self.decoder.prune_final();
    }

    /// Restart decoding.
    ///
    /// The feature cache, scorer and search state are always cleared. With
    /// `keep_buffer_data` the audio buffer and the extraction/transform
    /// stages keep their state, so audio that has not been consumed yet is
    /// decoded after the reset; otherwise they are cleared as well.
    pub fn reset(&mut self, keep_buffer_data: bool) {
        if !keep_buffer_data {
            self.audio_mut().reset();
            self.extractor_mut().reset();
            self.transformer_mut().reset();
        }
        // Also clears the feature matrix.
        self.scorer.reset();
        self.decoder.reset();
        debug!(keep_buffer_data, "Recognizer reset");
    }

    /// Word strings for a best path. Ids missing from the symbol table are
    /// rendered as numbers.
    pub fn words(&self, path: &BestPath) -> Vec<String> {
        path.words
            .iter()
            .map(|&id| {
                self.symbols
                    .word(id)
                    .map_or_else(|| id.to_string(), str::to_string)
            })
            .collect()
    }

    /// Number of frames at the end of `path` aligned to silence phones.
    pub fn trailing_silence_frames(&self, path: &BestPath) -> usize {
        let transitions = self.scorer.model().transitions();
        path.alignment
            .iter()
            .rev()
            .take_while(|&&tid| {
                transitions
                    .phone(tid)
                    .is_some_and(|phone| self.silence_phones.contains(&phone))
            })
            .count()
    }

    pub fn frames_decoded(&self) -> usize {
        self.decoder.num_frames_decoded()
    }

    /// Feature frames cached and ready for scoring.
    pub fn frames_ready(&self) -> usize {
        self.scorer.features().num_frames_ready()
    }

    pub fn state(&self) -> DecoderState {
        self.decoder.state()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn model(&self) -> &Arc<AcousticModel> {
        self.scorer.model()
    }

    pub fn acoustic_scale(&self) -> f32 {
        self.scorer.acoustic_scale()
    }

    /// Samples written but not yet consumed by feature extraction.
    pub fn audio_pending_samples(&self) -> usize {
        self.audio().available()
    }
}
