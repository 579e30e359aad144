//! On-disk fixtures shared by the integration tests.

#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const FEATURE_DIM: usize = 39;

/// Transition id 1 is speech (phone 2), id 2 is silence (phone 1).
pub fn model_json(dim: usize) -> String {
    let gmm = |mean: f32| {
        json!({
            "weights": [1.0],
            "means": [vec![mean; dim]],
            "variances": [vec![100.0; dim]],
        })
    };
    json!({
        "transitions": [ { "pdf": 0, "phone": 2 }, { "pdf": 1, "phone": 1 } ],
        "pdfs": [ gmm(0.0), gmm(1.0) ],
    })
    .to_string()
}

/// Two competing one-word loops; "one" is cheaper in the graph.
pub const TWO_WORD_GRAPH: &str = "\
# src dst ilabel olabel cost
0 1 1 1 0.5
1 1 1 0
1 1 2 0
0 2 1 2 3.0
2 2 1 0
2 2 2 0
1
2
";

pub const WORDS: &str = "<eps> 0\none 1\ntwo 2\n";

/// Files for one recognizer setup, removed on drop.
pub struct Fixture {
    pub dir: TempDir,
    pub model: PathBuf,
    pub graph: PathBuf,
    pub words: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_model(&model_json(FEATURE_DIM))
    }

    pub fn with_model(model: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, contents: &str| {
            let path = dir.path().join(name);
            fs::write(&path, contents).unwrap();
            path
        };
        let model = write("final.json", model);
        let graph = write("HCLG.fst", TWO_WORD_GRAPH);
        let words = write("words.txt", WORDS);
        Self {
            dir,
            model,
            graph,
            words,
        }
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Positional arguments as the command line takes them.
    pub fn args(&self) -> Vec<String> {
        vec![
            self.model.display().to_string(),
            self.graph.display().to_string(),
            self.words.display().to_string(),
            "1".to_string(),
        ]
    }

    pub fn write_wav(&self, name: &str, samples: &[i16], sample_rate: u32) -> PathBuf {
        let path = self.dir.path().join(name);
        write_wav(&path, samples, sample_rate);
        path
    }
}

pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

/// Deterministic pseudo-random samples.
pub fn noise(samples: usize) -> Vec<i16> {
    let mut state: u32 = 0x2545_f491;
    (0..samples)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            ((state >> 16) as i16) / 8
        })
        .collect()
}

pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
