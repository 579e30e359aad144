//! Command-line interface for latgen-decode
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use crate::defaults;
use crate::error::{LatgenError, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Streaming lattice decoder for WAV files
#[derive(Parser, Debug)]
#[command(
    name = "latgen-decode",
    version,
    about = "Decode 16-bit PCM WAV files into word hypotheses and lattices"
)]
pub struct Cli {
    /// Acoustic model (JSON)
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// Decode graph (AT&T text format)
    #[arg(value_name = "FST")]
    pub fst: PathBuf,

    /// Word symbol table
    #[arg(value_name = "WORDS")]
    pub words: PathBuf,

    /// Colon-separated silence phone ids (e.g. 1:2:3:4:5)
    #[arg(value_name = "SILENCE_PHONES")]
    pub silence_phones: String,

    /// Feature projection matrix; deltas are used when omitted
    #[arg(value_name = "TRANSFORM")]
    pub transform: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Search beam
    #[arg(long, value_name = "COST")]
    pub beam: Option<f32>,

    /// Maximum active tokens per frame
    #[arg(long, value_name = "N")]
    pub max_active: Option<usize>,

    /// Lattice pruning beam
    #[arg(long, value_name = "COST")]
    pub lattice_beam: Option<f32>,

    /// Scale applied to acoustic log-likelihoods (0 disables scaling)
    #[arg(long, value_name = "SCALE")]
    pub acoustic_scale: Option<f32>,

    /// Frames of left context for the feature transform
    #[arg(long, value_name = "FRAMES")]
    pub left_context: Option<usize>,

    /// Frames of right context for the feature transform
    #[arg(long, value_name = "FRAMES")]
    pub right_context: Option<usize>,

    /// Differencing order used without a projection matrix
    #[arg(long, value_name = "ORDER")]
    pub delta_order: Option<usize>,

    /// WAV files to decode; the file stem names the utterance
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub wav: Vec<PathBuf>,

    /// List of utterances, one `name path` pair per line
    #[arg(long, value_name = "FILE")]
    pub scp: Option<PathBuf>,

    /// Write hypotheses here instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Samples fed to the recognizer per call
    #[arg(long, value_name = "N", default_value_t = defaults::BATCH_SAMPLES)]
    pub batch_samples: usize,

    /// Suppress per-utterance logging
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Positional resource arguments in `ResourcePaths::from_args` order.
    pub fn positional_args(&self) -> Vec<String> {
        let mut args = vec![
            self.model.display().to_string(),
            self.fst.display().to_string(),
            self.words.display().to_string(),
            self.silence_phones.clone(),
        ];
        if let Some(transform) = &self.transform {
            args.push(transform.display().to_string());
        }
        args
    }

    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(beam) = self.beam {
            config.decoder.beam = beam;
        }
        if let Some(max_active) = self.max_active {
            config.decoder.max_active = max_active;
        }
        if let Some(lattice_beam) = self.lattice_beam {
            config.decoder.lattice_beam = lattice_beam;
        }
        if let Some(scale) = self.acoustic_scale {
            config.decoder.acoustic_scale = scale;
        }
        if let Some(left) = self.left_context {
            config.features.left_context = left;
        }
        if let Some(right) = self.right_context {
            config.features.right_context = right;
        }
        if let Some(order) = self.delta_order {
            config.features.delta_order = order;
        }
    }

    /// Utterances to decode: every `--wav` file, then every `--scp` entry.
    pub fn utterances(&self) -> Result<Vec<Utterance>> {
        let mut utterances: Vec<Utterance> =
            self.wav.iter().map(|p| Utterance::from_path(p)).collect();
        if let Some(scp) = &self.scp {
            let text = std::fs::read_to_string(scp).map_err(|e| LatgenError::ConfigParse {
                message: format!("cannot read {}: {}", scp.display(), e),
            })?;
            utterances.extend(parse_scp(&text)?);
        }
        if utterances.is_empty() {
            return Err(LatgenError::MissingArgument {
                name: "--wav or --scp".to_string(),
            });
        }
        Ok(utterances)
    }

    /// Log filter directive for the verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

/// One named audio file to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub name: String,
    pub path: PathBuf,
}

impl Utterance {
    /// Name the utterance after the file stem.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        Self {
            name,
            path: path.to_path_buf(),
        }
    }
}

/// Parse an utterance list: `name path` per line, blank lines and `#`
/// comments ignored. The path is everything after the first whitespace.
pub fn parse_scp(text: &str) -> Result<Vec<Utterance>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(line_no, line)| {
            let (name, path) = line
                .trim()
                .split_once(char::is_whitespace)
                .ok_or_else(|| LatgenError::ConfigParse {
                    message: format!("utterance list line {}: expected '<name> <path>'", line_no + 1),
                })?;
            Ok(Utterance {
                name: name.to_string(),
                path: PathBuf::from(path.trim()),
            })
        })
        .collect()
}
